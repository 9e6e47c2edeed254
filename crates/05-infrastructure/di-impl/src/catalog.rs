//! 类型目录：基于闭包的实例创建钩子
//!
//! 按类型标识登记构造函数、属性设置器与具名生命周期方法，
//! 容器按组件定义中的类型标识、属性名和回调名称查找并调用。

use di_abstractions::{InstanceFactory, MergedDefinition, ResolvedValue};
use infrastructure_common::{HookError, Instance};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

type Constructor = Arc<dyn Fn(&[ResolvedValue]) -> Result<Instance, HookError> + Send + Sync>;
type PropertySetter = Arc<dyn Fn(&Instance, &ResolvedValue) -> Result<(), HookError> + Send + Sync>;
type LifecycleMethod = Arc<dyn Fn(&Instance) -> Result<(), HookError> + Send + Sync>;

#[derive(Default)]
struct TypeEntry {
    constructor: Option<Constructor>,
    setters: HashMap<String, PropertySetter>,
    methods: HashMap<String, LifecycleMethod>,
}

/// 类型目录
#[derive(Default)]
pub struct TypeCatalog {
    types: HashMap<String, TypeEntry>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记类型的构造函数
    pub fn register<F>(mut self, type_name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&[ResolvedValue]) -> Result<Instance, HookError> + Send + Sync + 'static,
    {
        self.types.entry(type_name.into()).or_default().constructor = Some(Arc::new(constructor));
        self
    }

    /// 登记属性设置器
    pub fn property<T, F>(
        mut self,
        type_name: impl Into<String>,
        property: impl Into<String>,
        setter: F,
    ) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, &ResolvedValue) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let setter: PropertySetter = Arc::new(
            move |instance: &Instance, value: &ResolvedValue| -> Result<(), HookError> {
                setter(downcast::<T>(instance)?, value)
            },
        );
        self.types
            .entry(type_name.into())
            .or_default()
            .setters
            .insert(property.into(), setter);
        self
    }

    /// 登记具名生命周期方法（初始化或销毁回调）
    pub fn method<T, F>(
        mut self,
        type_name: impl Into<String>,
        method: impl Into<String>,
        f: F,
    ) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let method_fn: LifecycleMethod =
            Arc::new(move |instance: &Instance| -> Result<(), HookError> {
                f(downcast::<T>(instance)?)
            });
        self.types
            .entry(type_name.into())
            .or_default()
            .methods
            .insert(method.into(), method_fn);
        self
    }

    pub fn contains_type(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    fn entry<'a>(
        &'a self,
        name: &str,
        definition: &'a MergedDefinition,
    ) -> Result<(&'a str, &'a TypeEntry), HookError> {
        let type_name = definition
            .type_name()
            .ok_or_else(|| format!("组件 '{name}' 没有声明类型"))?;
        let entry = self
            .types
            .get(type_name)
            .ok_or_else(|| format!("未登记的类型 '{type_name}'"))?;
        Ok((type_name, entry))
    }

    fn invoke_method(
        &self,
        name: &str,
        definition: &MergedDefinition,
        method: &str,
        instance: &Instance,
    ) -> Result<(), HookError> {
        let (type_name, entry) = self.entry(name, definition)?;
        let method_fn = entry
            .methods
            .get(method)
            .ok_or_else(|| format!("类型 '{type_name}' 没有方法 '{method}'"))?;
        trace!("调用组件 '{}' 的方法 '{}'", name, method);
        method_fn(instance)
    }
}

fn downcast<T: Any + Send + Sync>(instance: &Instance) -> Result<&T, HookError> {
    instance
        .downcast_ref::<T>()
        .ok_or_else(|| format!("实例类型不是 {}", std::any::type_name::<T>()).into())
}

impl InstanceFactory for TypeCatalog {
    fn instantiate(
        &self,
        name: &str,
        definition: &MergedDefinition,
        args: &[ResolvedValue],
    ) -> Result<Instance, HookError> {
        let (type_name, entry) = self.entry(name, definition)?;
        let constructor = entry
            .constructor
            .as_ref()
            .ok_or_else(|| format!("类型 '{type_name}' 没有登记构造函数"))?;
        constructor(args)
    }

    fn populate(
        &self,
        name: &str,
        definition: &MergedDefinition,
        instance: &Instance,
        properties: &[(String, ResolvedValue)],
    ) -> Result<(), HookError> {
        if properties.is_empty() {
            return Ok(());
        }
        let (type_name, entry) = self.entry(name, definition)?;
        for (property, value) in properties {
            let setter = entry
                .setters
                .get(property)
                .ok_or_else(|| format!("类型 '{type_name}' 没有属性 '{property}'"))?;
            setter(instance, value)?;
        }
        Ok(())
    }

    fn initialize(
        &self,
        name: &str,
        definition: &MergedDefinition,
        instance: &Instance,
    ) -> Result<(), HookError> {
        match definition.init_method() {
            Some(method) => self.invoke_method(name, definition, method, instance),
            None => Ok(()),
        }
    }

    fn destroy(
        &self,
        name: &str,
        definition: &MergedDefinition,
        instance: &Instance,
    ) -> Result<(), HookError> {
        match definition.destroy_method() {
            Some(method) => self.invoke_method(name, definition, method, instance),
            None => Ok(()),
        }
    }
}
