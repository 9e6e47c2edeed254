//! 依赖注入容器抽象接口

use crate::definition::ComponentDefinition;
use crate::factory::{ComponentPostProcessor, InstanceFactory};
use crate::registry::DefinitionSource;
use crate::resolver::{ExpressionEvaluator, ResolvedValue};
use crate::scope::Scope;
use infrastructure_common::{downcast_instance, ContainerConfig, ContainerError, Instance};
use std::any::Any;
use std::sync::Arc;

/// 依赖注入容器 trait
///
/// 所有操作都是同步的，可以在多个线程上并发调用
pub trait DiContainer: Send + Sync {
    /// 按名称获取组件实例
    fn get(&self, name: &str) -> Result<Instance, ContainerError>;

    /// 使用显式构造参数获取组件实例
    ///
    /// 显式参数只对非单例组件有意义；单例已存在时参数被忽略
    fn get_with_args(&self, name: &str, args: &[ResolvedValue]) -> Result<Instance, ContainerError>;

    /// 按名称获取指定类型的组件
    fn get_typed<T>(&self, name: &str) -> Result<Arc<T>, ContainerError>
    where
        T: Any + Send + Sync,
        Self: Sized,
    {
        let instance = self.get(name)?;
        downcast_instance::<T>(&instance).ok_or_else(|| ContainerError::ComponentTypeMismatch {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// 是否存在指定名称的组件（定义或实例，包括父容器）
    fn contains(&self, name: &str) -> bool;

    /// 指定名称的组件是否为单例
    fn is_singleton(&self, name: &str) -> Result<bool, ContainerError>;

    /// 指定名称的组件是否为原型
    fn is_prototype(&self, name: &str) -> Result<bool, ContainerError>;

    /// 销毁指定名称的组件实例（单例或自定义作用域）
    fn destroy(&self, name: &str);

    /// 销毁所有单例
    fn destroy_all(&self);
}

/// 容器构建器 trait
pub trait ContainerBuilder: Sized {
    /// 关联的容器类型
    type Container: DiContainer;

    /// 构建容器
    fn build(self) -> Result<Self::Container, ContainerError>;

    /// 添加组件定义
    fn register_definition(self, name: impl Into<String>, definition: ComponentDefinition) -> Self;

    /// 添加已存在的单例实例
    fn register_instance(self, name: impl Into<String>, instance: Instance) -> Self;

    /// 设置后备定义来源
    fn with_definition_source(self, source: Arc<dyn DefinitionSource>) -> Self;

    /// 设置父容器
    fn with_parent(self, parent: Arc<Self::Container>) -> Self;

    /// 设置实例创建钩子
    fn with_instance_factory(self, factory: Arc<dyn InstanceFactory>) -> Self;

    /// 添加后置处理器
    fn with_post_processor(self, processor: Arc<dyn ComponentPostProcessor>) -> Self;

    /// 注册自定义作用域
    fn with_scope(self, name: impl Into<String>, scope: Arc<dyn Scope>) -> Self;

    /// 设置表达式求值器
    fn with_evaluator(self, evaluator: Arc<dyn ExpressionEvaluator>) -> Self;

    /// 设置容器配置
    fn with_config(self, config: ContainerConfig) -> Self;
}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// 本地组件定义数量
    pub registered_definitions: usize,
    /// 已完全创建的单例数量
    pub active_singletons: usize,
    /// 缓存的合并定义数量
    pub merged_definitions: usize,
    /// 需要销毁回调的单例数量
    pub disposable_singletons: usize,
    /// 已注册的作用域数量
    pub registered_scopes: usize,
}
