//! 组件实例基础定义

use std::any::{Any, TypeId};
use std::sync::Arc;

/// 容器管理的组件实例
///
/// 容器只关心实例的身份（指针），不关心具体类型
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 将具体组件包装为容器实例
pub fn instance<T: Any + Send + Sync>(component: T) -> Instance {
    Arc::new(component)
}

/// 两个实例是否为同一对象
pub fn same_instance(a: &Instance, b: &Instance) -> bool {
    Arc::ptr_eq(a, b)
}

/// 实例的具体类型ID
pub fn instance_type_id(instance: &Instance) -> TypeId {
    Any::type_id(&**instance)
}

/// 将容器实例转换为具体类型
pub fn downcast_instance<T: Any + Send + Sync>(instance: &Instance) -> Option<Arc<T>> {
    instance.clone().downcast::<T>().ok()
}
