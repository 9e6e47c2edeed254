//! 属性值解析器
//!
//! 把定义中的原始值（字面量、组件引用、内部组件、集合）转换成注入用的具体值，
//! 解析引用时会回到容器获取目标组件。

use crate::container::DiContainerImpl;
use di_abstractions::{
    ComponentReference, InnerDefinition, MergedDefinition, PropertyValue, ResolvedValue,
    TypedLiteral,
};
use infrastructure_common::{instance_type_id, ContainerError, Lifetime};
use tracing::{debug, trace};

/// 单个组件的属性值解析器
pub(crate) struct ValueResolver<'a> {
    container: &'a DiContainerImpl,
    owner: &'a str,
    definition: &'a MergedDefinition,
}

impl<'a> ValueResolver<'a> {
    pub(crate) fn new(
        container: &'a DiContainerImpl,
        owner: &'a str,
        definition: &'a MergedDefinition,
    ) -> Self {
        Self {
            container,
            owner,
            definition,
        }
    }

    /// 按下标顺序解析构造参数，缺失的下标填空值
    pub(crate) fn resolve_constructor_args(&self) -> Result<Vec<ResolvedValue>, ContainerError> {
        let declared = self.definition.constructor_args();
        let Some(last) = declared.keys().next_back() else {
            return Ok(Vec::new());
        };
        let mut args = vec![ResolvedValue::Null; last + 1];
        for (index, value) in declared {
            args[*index] = self.resolve(&format!("构造参数 #{index}"), value)?;
        }
        Ok(args)
    }

    /// 按声明顺序解析属性
    pub(crate) fn resolve_properties(
        &self,
    ) -> Result<Vec<(String, ResolvedValue)>, ContainerError> {
        self.definition
            .properties()
            .iter()
            .map(|(name, value)| {
                let resolved = self.resolve(&format!("属性 '{name}'"), value)?;
                Ok((name.clone(), resolved))
            })
            .collect()
    }

    /// 解析单个原始值
    pub(crate) fn resolve(
        &self,
        label: &str,
        value: &PropertyValue,
    ) -> Result<ResolvedValue, ContainerError> {
        match value {
            PropertyValue::Reference(reference) => self.resolve_reference(label, reference),
            PropertyValue::NameReference(target) => {
                let target = self.evaluate_name(label, target)?;
                if !self.container.contains_component(&target) {
                    return Err(ContainerError::InvalidReferenceName {
                        name: self.owner.to_string(),
                        label: label.to_string(),
                        target,
                    });
                }
                Ok(ResolvedValue::Name(target))
            }
            PropertyValue::Inner(inner) => self.resolve_inner(label, inner),
            PropertyValue::List(items) => {
                Ok(ResolvedValue::List(self.resolve_items(label, items)?))
            }
            PropertyValue::Set(items) => {
                let mut unique: Vec<ResolvedValue> = Vec::with_capacity(items.len());
                for item in self.resolve_items(label, items)? {
                    if !unique.contains(&item) {
                        unique.push(item);
                    }
                }
                Ok(ResolvedValue::Set(unique))
            }
            PropertyValue::Map(entries) => self.resolve_entries(label, entries, false),
            PropertyValue::Properties(entries) => self.resolve_entries(label, entries, true),
            PropertyValue::Literal(literal) => self.evaluate_literal(label, literal),
            PropertyValue::Value(value) => Ok(ResolvedValue::Value(value.clone())),
            PropertyValue::Null => Ok(ResolvedValue::Null),
        }
    }

    fn resolve_items(
        &self,
        label: &str,
        items: &[PropertyValue],
    ) -> Result<Vec<ResolvedValue>, ContainerError> {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| self.resolve(&format!("{label}[{index}]"), item))
            .collect()
    }

    fn resolve_entries(
        &self,
        label: &str,
        entries: &[(PropertyValue, PropertyValue)],
        reject_null: bool,
    ) -> Result<ResolvedValue, ContainerError> {
        let mut resolved: Vec<(ResolvedValue, ResolvedValue)> = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let key = self.resolve(label, key)?;
            let value = self.resolve(&format!("{label}[{}]", describe_key(&key)), value)?;
            if reject_null && (key.is_null() || value.is_null()) {
                return Err(ContainerError::InvalidPropertiesEntry {
                    name: self.owner.to_string(),
                    label: label.to_string(),
                });
            }
            // 重复的键保留首次出现的位置
            match resolved.iter_mut().find(|(existing, _)| *existing == key) {
                Some(entry) => entry.1 = value,
                None => resolved.push((key, value)),
            }
        }
        Ok(ResolvedValue::Map(resolved))
    }

    fn resolve_reference(
        &self,
        label: &str,
        reference: &ComponentReference,
    ) -> Result<ResolvedValue, ContainerError> {
        let target = self.evaluate_name(label, &reference.name)?;
        trace!("组件 '{}' 的 {} 引用组件 '{}'", self.owner, label, target);

        let result = if reference.to_parent {
            match self.container.parent() {
                Some(parent) => parent.do_get(&target, None),
                None => {
                    return Err(ContainerError::UnsatisfiedReference {
                        name: self.owner.to_string(),
                        label: label.to_string(),
                        target,
                        reason: "当前容器没有父容器".to_string(),
                    })
                }
            }
        } else {
            self.container.do_get(&target, None)
        };

        let instance = match result {
            Ok(instance) => instance,
            Err(ContainerError::NoSuchComponent { name }) if name == target => {
                if reference.optional {
                    debug!("可选引用的目标组件不存在，注入空值: {}", target);
                    return Ok(ResolvedValue::Null);
                }
                return Err(ContainerError::UnsatisfiedReference {
                    name: self.owner.to_string(),
                    label: label.to_string(),
                    target,
                    reason: "目标组件未定义".to_string(),
                });
            }
            Err(err @ ContainerError::CurrentlyInCreation { .. }) if reference.optional => {
                debug!("可选引用的目标组件正在创建中，注入空值: {}", target);
                self.container.registry().on_suppressed(err);
                return Ok(ResolvedValue::Null);
            }
            Err(err) => return Err(self.reference_failure(label, err)),
        };

        if let Some(required) = &reference.required_type {
            if instance_type_id(&instance) != required.id {
                return Err(ContainerError::UnsatisfiedReference {
                    name: self.owner.to_string(),
                    label: label.to_string(),
                    target,
                    reason: format!("目标实例不是期望的类型 {}", required.name),
                });
            }
        }

        if !reference.to_parent {
            self.container.registry().register_dependent(&target, self.owner);
        }
        Ok(ResolvedValue::Component(instance))
    }

    fn resolve_inner(
        &self,
        label: &str,
        inner: &InnerDefinition,
    ) -> Result<ResolvedValue, ContainerError> {
        let base = inner
            .name
            .clone()
            .unwrap_or_else(|| self.container.generate_inner_name());
        let name = self.adapt_inner_name(&base);
        debug!("组件 '{}' 的 {} 创建内部组件: {}", self.owner, label, name);

        let inner_label = format!("{label} 的内部组件 '{name}'");
        let merged = self
            .container
            .merger()
            .merge_inner(&name, &inner.definition, self.definition)
            .map_err(|e| self.reference_failure(&inner_label, e))?;

        let registry = self.container.registry();
        // 非单例拥有者每次创建都会产生新的内部组件，不记录包含关系
        if self.definition.scope() == &Lifetime::Singleton {
            registry.register_contained(&name, self.owner);
        }

        for dependency in merged.depends_on() {
            registry.register_dependent(dependency, &name);
            self.container
                .do_get(dependency, None)
                .map_err(|e| self.reference_failure(&inner_label, e))?;
        }

        let instance = self
            .container
            .create_component(&name, &merged, None)
            .map_err(|e| self.reference_failure(&inner_label, e))?;
        Ok(ResolvedValue::Component(instance))
    }

    /// 名称已被占用时追加 `#序号`
    fn adapt_inner_name(&self, base: &str) -> String {
        let mut name = base.to_string();
        let mut counter = 0;
        while self.container.is_name_in_use(&name) {
            counter += 1;
            name = format!("{base}#{counter}");
        }
        name
    }

    fn evaluate_literal(
        &self,
        label: &str,
        literal: &TypedLiteral,
    ) -> Result<ResolvedValue, ContainerError> {
        let raw = || ResolvedValue::Value(serde_json::Value::String(literal.value().to_string()));
        let Some(evaluator) = self.container.evaluator() else {
            return Ok(raw());
        };
        if literal.is_known_static() {
            return Ok(raw());
        }

        let value = evaluator
            .evaluate(literal.value(), Some(self.definition))
            .map_err(|e| {
                ContainerError::hook_failure(
                    self.owner,
                    format!("{label} 的表达式 '{}' 求值失败", literal.value()),
                    e,
                )
            })?;
        if value.as_str() == Some(literal.value()) {
            literal.mark_static();
        } else {
            literal.mark_dynamic();
        }
        Ok(ResolvedValue::Value(value))
    }

    fn evaluate_name(&self, label: &str, raw: &str) -> Result<String, ContainerError> {
        let Some(evaluator) = self.container.evaluator() else {
            return Ok(raw.to_string());
        };
        let value = evaluator
            .evaluate(raw, Some(self.definition))
            .map_err(|e| {
                ContainerError::hook_failure(
                    self.owner,
                    format!("{label} 引用的组件名称 '{raw}' 求值失败"),
                    e,
                )
            })?;
        Ok(match value {
            serde_json::Value::String(name) => name,
            other => other.to_string(),
        })
    }

    fn reference_failure(&self, label: &str, source: ContainerError) -> ContainerError {
        ContainerError::ReferenceFailure {
            name: self.owner.to_string(),
            label: label.to_string(),
            source: Box::new(source),
            related_causes: Vec::new(),
        }
    }
}

fn describe_key(key: &ResolvedValue) -> String {
    match key {
        ResolvedValue::Value(serde_json::Value::String(s)) => s.clone(),
        ResolvedValue::Value(other) => other.to_string(),
        ResolvedValue::Name(name) => name.clone(),
        other => format!("{other:?}"),
    }
}
