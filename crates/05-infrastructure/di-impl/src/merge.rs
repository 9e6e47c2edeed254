//! 组件定义合并解析器
//!
//! 沿父定义链把原始定义展开成 [`MergedDefinition`] 并缓存。
//! 缓存只通过过期标记失效，过期的定义在下次访问时重新合并。

use dashmap::DashSet;
use di_abstractions::{ComponentDefinition, DefinitionSource, MergedDefinition};
use infrastructure_common::ContainerError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// 定义合并解析器
pub struct DefinitionMerger {
    source: Arc<dyn DefinitionSource>,
    cache: Mutex<HashMap<String, Arc<MergedDefinition>>>,
    already_created: DashSet<String>,
    parent: Option<Arc<DefinitionMerger>>,
    cache_metadata: bool,
}

impl DefinitionMerger {
    pub fn new(
        source: Arc<dyn DefinitionSource>,
        parent: Option<Arc<DefinitionMerger>>,
        cache_metadata: bool,
    ) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
            already_created: DashSet::new(),
            parent,
            cache_metadata,
        }
    }

    /// 获取合并后的定义
    ///
    /// 本地没有定义时交给父容器的解析器
    pub fn merged(&self, name: &str) -> Result<Arc<MergedDefinition>, ContainerError> {
        if !self.source.contains_definition(name) {
            if let Some(parent) = &self.parent {
                return parent.merged(name);
            }
        }
        self.local_merged(name, &mut Vec::new())
    }

    /// 合并内部组件定义，结果不缓存
    pub fn merge_inner(
        &self,
        name: &str,
        definition: &ComponentDefinition,
        containing: &MergedDefinition,
    ) -> Result<Arc<MergedDefinition>, ContainerError> {
        self.merge(name, definition, Some(containing), &mut Vec::new())
    }

    fn local_merged(
        &self,
        name: &str,
        chain: &mut Vec<String>,
    ) -> Result<Arc<MergedDefinition>, ContainerError> {
        if let Some(cached) = self.cache.lock().get(name) {
            if !cached.is_stale() {
                trace!("合并定义缓存命中: {}", name);
                return Ok(Arc::clone(cached));
            }
        }
        let raw = self
            .source
            .definition(name)
            .ok_or_else(|| ContainerError::no_such_component(name))?;
        self.merge(name, &raw, None, chain)
    }

    fn merge(
        &self,
        name: &str,
        raw: &ComponentDefinition,
        containing: Option<&MergedDefinition>,
        chain: &mut Vec<String>,
    ) -> Result<Arc<MergedDefinition>, ContainerError> {
        let merged = match raw.parent.as_deref() {
            None => MergedDefinition::from_root(name, raw),
            Some(parent_name) => {
                let parent = self.parent_definition(name, parent_name, chain)?;
                MergedDefinition::overlay(&parent, name, raw)
            }
        }
        .contained_in(containing);

        if containing.is_some() {
            return Ok(Arc::new(merged));
        }

        debug!("合并组件定义: {}", name);
        let mut cache = self.cache.lock();
        if let Some(previous) = cache.get(name) {
            if !previous.is_stale() {
                return Ok(Arc::clone(previous));
            }
            merged.inherit_derived(previous);
        }
        let merged = Arc::new(merged);
        if self.cache_metadata || self.already_created.contains(name) {
            cache.insert(name.to_string(), Arc::clone(&merged));
        }
        Ok(merged)
    }

    fn parent_definition(
        &self,
        name: &str,
        parent_name: &str,
        chain: &mut Vec<String>,
    ) -> Result<Arc<MergedDefinition>, ContainerError> {
        let unresolvable = |reason: String| ContainerError::UnresolvableParentReference {
            name: name.to_string(),
            parent: parent_name.to_string(),
            reason,
        };

        if parent_name == name {
            // 同名父定义只能来自父容器
            return match &self.parent {
                Some(parent) => parent.merged(parent_name).map_err(|e| unresolvable(e.to_string())),
                None => Err(unresolvable(
                    "同名父定义只能由父容器提供，但当前容器没有父容器".to_string(),
                )),
            };
        }

        if chain.iter().any(|n| n == parent_name) {
            return Err(unresolvable(format!("父定义链存在循环: {}", chain.join(" -> "))));
        }

        let result = if self.source.contains_definition(parent_name) {
            chain.push(name.to_string());
            let result = self.local_merged(parent_name, chain);
            chain.pop();
            result
        } else if let Some(parent) = &self.parent {
            parent.merged(parent_name)
        } else {
            Err(ContainerError::no_such_component(parent_name))
        };

        result.map_err(|e| match e {
            ContainerError::UnresolvableParentReference { .. } => e,
            other => unresolvable(other.to_string()),
        })
    }

    /// 缓存中的合并定义（不触发合并）
    pub fn cached(&self, name: &str) -> Option<Arc<MergedDefinition>> {
        self.cache.lock().get(name).cloned()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }

    /// 标记指定名称的合并定义过期
    pub fn mark_stale(&self, name: &str) {
        if let Some(merged) = self.cache.lock().get(name) {
            merged.mark_stale();
        }
    }

    /// 标记指定定义以及所有由它派生的合并定义过期
    pub fn invalidate(&self, name: &str) {
        for merged in self.cache.lock().values() {
            if merged.derives_from(name) {
                trace!("合并定义过期: {}", merged.name());
                merged.mark_stale();
            }
        }
    }

    /// 标记所有尚未用于创建实例的合并定义过期
    pub fn clear_metadata_cache(&self) {
        for (name, merged) in self.cache.lock().iter() {
            if !self.already_created.contains(name) {
                merged.mark_stale();
            }
        }
    }

    /// 首次创建时让定义重新合并一次，以反映期间的元数据变更
    pub fn mark_as_created(&self, name: &str) {
        if self.already_created.contains(name) {
            return;
        }
        let cache = self.cache.lock();
        if !self.already_created.contains(name) {
            if let Some(merged) = cache.get(name) {
                merged.mark_stale();
            }
            self.already_created.insert(name.to_string());
        }
    }

    /// 创建失败后撤销创建标记
    pub fn cleanup_after_failure(&self, name: &str) {
        self.already_created.remove(name);
    }

    pub fn has_been_created(&self, name: &str) -> bool {
        self.already_created.contains(name)
    }
}
