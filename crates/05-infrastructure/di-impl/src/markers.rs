//! 原型组件的创建标记
//!
//! 原型实例从不共享，循环检测只需要在当前线程内进行

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

thread_local! {
    static PROTOTYPES_IN_CREATION: RefCell<HashMap<Uuid, HashSet<String>>> =
        RefCell::new(HashMap::new());
}

/// 当前线程上指定容器的原型组件是否正在创建
pub(crate) fn is_prototype_in_creation(container: Uuid, name: &str) -> bool {
    PROTOTYPES_IN_CREATION.with(|markers| {
        markers
            .borrow()
            .get(&container)
            .is_some_and(|names| names.contains(name))
    })
}

/// 原型创建标记守卫，离开作用域时移除标记
pub(crate) struct PrototypeCreationGuard {
    container: Uuid,
    name: String,
}

impl PrototypeCreationGuard {
    pub(crate) fn enter(container: Uuid, name: &str) -> Self {
        PROTOTYPES_IN_CREATION.with(|markers| {
            markers
                .borrow_mut()
                .entry(container)
                .or_default()
                .insert(name.to_string());
        });
        Self {
            container,
            name: name.to_string(),
        }
    }
}

impl Drop for PrototypeCreationGuard {
    fn drop(&mut self) {
        PROTOTYPES_IN_CREATION.with(|markers| {
            let mut markers = markers.borrow_mut();
            if let Some(names) = markers.get_mut(&self.container) {
                names.remove(&self.name);
                if names.is_empty() {
                    markers.remove(&self.container);
                }
            }
        });
    }
}
