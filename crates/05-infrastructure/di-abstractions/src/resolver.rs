//! 解析后的注入值与表达式求值抽象

use crate::definition::MergedDefinition;
use infrastructure_common::{downcast_instance, same_instance, HookError, Instance};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 解析后的属性/构造参数值
#[derive(Clone)]
pub enum ResolvedValue {
    /// 空值
    Null,
    /// 组件实例
    Component(Instance),
    /// 组件名称（按名称引用的结果）
    Name(String),
    /// 具体数据
    Value(serde_json::Value),
    /// 有序列表
    List(Vec<ResolvedValue>),
    /// 去重集合（保持首次出现顺序）
    Set(Vec<ResolvedValue>),
    /// 键值映射（保持插入顺序）
    Map(Vec<(ResolvedValue, ResolvedValue)>),
}

impl ResolvedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// 组件实例
    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Self::Component(instance) => Some(instance),
            _ => None,
        }
    }

    /// 转换为具体类型的组件
    pub fn as_component<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.as_instance().and_then(downcast_instance::<T>)
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(serde_json::Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(serde_json::Value::as_i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_value().and_then(serde_json::Value::as_bool)
    }

    /// 列表或集合的元素
    pub fn as_items(&self) -> Option<&[ResolvedValue]> {
        match self {
            Self::List(items) | Self::Set(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_entries(&self) -> Option<&[(ResolvedValue, ResolvedValue)]> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// 按键查找映射中的值
    pub fn entry(&self, key: &ResolvedValue) -> Option<&ResolvedValue> {
        self.as_entries()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// 组件按身份比较，其余按值比较
impl PartialEq for ResolvedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Component(a), Self::Component(b)) => same_instance(a, b),
            (Self::Name(a), Self::Name(b)) => a == b,
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::List(a), Self::List(b)) | (Self::Set(a), Self::Set(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Component(instance) => write!(f, "Component({:p})", Arc::as_ptr(instance)),
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Set(items) => f.debug_tuple("Set").field(items).finish(),
            Self::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
        }
    }
}

impl From<serde_json::Value> for ResolvedValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Value(value)
    }
}

impl From<Instance> for ResolvedValue {
    fn from(instance: Instance) -> Self {
        Self::Component(instance)
    }
}

/// 表达式求值器
///
/// 对字面量字符串求值，返回值与原文不同时该字面量被标记为动态
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate(
        &self,
        expression: &str,
        definition: Option<&MergedDefinition>,
    ) -> Result<serde_json::Value, HookError>;
}
