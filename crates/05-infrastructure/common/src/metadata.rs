//! 元数据定义
//!
//! 提供组件类型的元数据信息

use std::any::TypeId;

/// 类型信息
///
/// 由组件定义中声明的类型标识推导而来，合并定义重新计算时可以复用
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// 类型名称（不含模块路径）
    pub name: String,
    /// 模块路径
    pub module_path: String,
    /// 完整类型标识
    pub qualified_name: String,
}

impl TypeInfo {
    /// 从类型获取类型信息
    pub fn of<T: 'static>() -> Self {
        Self::from_name(std::any::type_name::<T>())
    }

    /// 从类型标识创建类型信息（用于声明式定义）
    pub fn from_name(qualified_name: &str) -> Self {
        let qualified_name = qualified_name.trim();
        let (module_path, name) = match qualified_name.rsplit_once("::") {
            Some((module, name)) => (module.to_string(), name.to_string()),
            None => (String::new(), qualified_name.to_string()),
        };
        Self {
            name,
            module_path,
            qualified_name: qualified_name.to_string(),
        }
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &str {
        &self.name
    }
}

/// 必需类型约束
///
/// 引用注入时用于校验目标实例的具体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredType {
    /// 类型ID
    pub id: TypeId,
    /// 类型名称（用于错误信息）
    pub name: &'static str,
}

impl RequiredType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}
