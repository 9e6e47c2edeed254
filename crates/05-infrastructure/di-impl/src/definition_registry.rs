//! 内存中的组件定义注册表

use di_abstractions::{ComponentDefinition, DefinitionSource};
use indexmap::IndexMap;
use infrastructure_common::ContainerError;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// 组件定义注册表
///
/// 保持注册顺序；本地未找到的定义再到后备来源中查找
pub struct DefinitionRegistry {
    definitions: RwLock<IndexMap<String, Arc<ComponentDefinition>>>,
    fallback: Option<Arc<dyn DefinitionSource>>,
    allow_overriding: bool,
}

impl DefinitionRegistry {
    pub fn new(allow_overriding: bool) -> Self {
        Self {
            definitions: RwLock::new(IndexMap::new()),
            fallback: None,
            allow_overriding,
        }
    }

    /// 设置后备定义来源
    pub fn with_fallback(mut self, fallback: Arc<dyn DefinitionSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// 注册定义，返回被覆盖的旧定义
    pub fn register(
        &self,
        name: &str,
        definition: ComponentDefinition,
    ) -> Result<Option<Arc<ComponentDefinition>>, ContainerError> {
        let mut definitions = self.definitions.write();
        if definitions.contains_key(name) {
            if !self.allow_overriding {
                return Err(ContainerError::DefinitionOverrideNotAllowed {
                    name: name.to_string(),
                });
            }
            info!("覆盖组件定义: {}", name);
        } else {
            debug!("注册组件定义: {}", name);
        }
        Ok(definitions.insert(name.to_string(), Arc::new(definition)))
    }

    /// 移除本地定义
    pub fn remove(&self, name: &str) -> Option<Arc<ComponentDefinition>> {
        self.definitions.write().shift_remove(name)
    }

    /// 本地是否存在定义（不查后备来源）
    pub fn contains_local(&self, name: &str) -> bool {
        self.definitions.read().contains_key(name)
    }

    /// 本地定义数量
    pub fn len(&self) -> usize {
        self.definitions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.read().is_empty()
    }
}

impl DefinitionSource for DefinitionRegistry {
    fn definition(&self, name: &str) -> Option<Arc<ComponentDefinition>> {
        if let Some(definition) = self.definitions.read().get(name) {
            return Some(Arc::clone(definition));
        }
        self.fallback.as_ref()?.definition(name)
    }

    fn contains_definition(&self, name: &str) -> bool {
        self.contains_local(name)
            || self
                .fallback
                .as_ref()
                .is_some_and(|fallback| fallback.contains_definition(name))
    }

    fn definition_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.read().keys().cloned().collect();
        if let Some(fallback) = &self.fallback {
            for name in fallback.definition_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}
