//! 组件创建钩子
//!
//! 容器本身不知道如何构造具体类型，实例化、属性注入与初始化都交给 [`InstanceFactory`]，
//! 对实例的包装与替换交给 [`ComponentPostProcessor`]

use crate::definition::MergedDefinition;
use crate::resolver::ResolvedValue;
use infrastructure_common::{HookError, Instance};

/// 实例创建钩子
pub trait InstanceFactory: Send + Sync {
    /// 用解析后的构造参数创建原始实例
    fn instantiate(
        &self,
        name: &str,
        definition: &MergedDefinition,
        args: &[ResolvedValue],
    ) -> Result<Instance, HookError>;

    /// 向实例注入解析后的属性值（按声明顺序）
    fn populate(
        &self,
        name: &str,
        definition: &MergedDefinition,
        instance: &Instance,
        properties: &[(String, ResolvedValue)],
    ) -> Result<(), HookError>;

    /// 执行初始化回调
    fn initialize(
        &self,
        _name: &str,
        _definition: &MergedDefinition,
        _instance: &Instance,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// 实例是否需要在销毁时执行回调
    fn requires_destruction(
        &self,
        _name: &str,
        definition: &MergedDefinition,
        _instance: &Instance,
    ) -> bool {
        definition.destroy_method().is_some()
    }

    /// 执行销毁回调
    fn destroy(
        &self,
        _name: &str,
        _definition: &MergedDefinition,
        _instance: &Instance,
    ) -> Result<(), HookError> {
        Ok(())
    }
}

/// 组件后置处理器
///
/// 按注册顺序依次调用，每一步都可以把实例替换成包装对象
pub trait ComponentPostProcessor: Send + Sync {
    /// 单例被提前引用时调用，返回值即为早期引用
    fn early_reference(&self, _name: &str, instance: Instance) -> Result<Instance, HookError> {
        Ok(instance)
    }

    /// 初始化回调之前调用
    fn before_initialization(
        &self,
        _name: &str,
        instance: Instance,
    ) -> Result<Instance, HookError> {
        Ok(instance)
    }

    /// 初始化回调之后调用
    fn after_initialization(&self, _name: &str, instance: Instance) -> Result<Instance, HookError> {
        Ok(instance)
    }

    /// 是否需要参与该实例的销毁
    fn requires_destruction(&self, _name: &str, _instance: &Instance) -> bool {
        false
    }

    /// 实例销毁回调之前调用
    fn before_destruction(&self, _name: &str, _instance: &Instance) -> Result<(), HookError> {
        Ok(())
    }
}
