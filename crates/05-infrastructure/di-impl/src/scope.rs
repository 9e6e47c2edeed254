//! 基于映射表的自定义作用域

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use di_abstractions::{DestructionCallback, Scope, ScopeObjectFactory};
use indexmap::IndexMap;
use infrastructure_common::{ContainerError, Instance};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::thread::{self, ThreadId};
use tracing::{debug, info};
use uuid::Uuid;

type PendingKey = (String, ThreadId);

/// 映射表作用域
///
/// 作用域内每个名称保存一个实例，`close` 时按注册的逆序执行销毁回调并清空实例。
///
/// 创建过程中登记的销毁回调先暂存在创建线程名下，只有最终放入作用域的实例保留回调；
/// 并发创建中落败的实例立即执行自己的回调。
pub struct MapScope {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
    instances: DashMap<String, Instance>,
    callbacks: Mutex<IndexMap<String, DestructionCallback>>,
    pending: Mutex<HashMap<PendingKey, Option<DestructionCallback>>>,
}

impl MapScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
            instances: DashMap::new(),
            callbacks: Mutex::new(IndexMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// 结束作用域
    pub fn close(&self) {
        let callbacks: Vec<(String, DestructionCallback)> =
            self.callbacks.lock().drain(..).collect();
        info!(
            "关闭作用域 '{}' ({}): {} 个销毁回调",
            self.name,
            self.id,
            callbacks.len()
        );
        for (name, callback) in callbacks.into_iter().rev() {
            debug!("执行作用域组件的销毁回调: {}", name);
            callback();
        }
        self.instances.clear();
    }
}

impl Scope for MapScope {
    fn get(&self, name: &str, factory: ScopeObjectFactory<'_>) -> Result<Instance, ContainerError> {
        if let Some(instance) = self.instances.get(name) {
            return Ok(instance.clone());
        }
        // 创建过程中不持有分片锁，工厂可能再次访问本作用域
        let key = (name.to_string(), thread::current().id());
        self.pending.lock().insert(key.clone(), None);
        let created = factory();
        let callback = self.pending.lock().remove(&key).flatten();
        let created = created?;

        let (instance, discarded) = match self.instances.entry(name.to_string()) {
            Entry::Occupied(existing) => (existing.get().clone(), callback),
            Entry::Vacant(slot) => {
                if let Some(callback) = callback {
                    self.callbacks.lock().insert(name.to_string(), callback);
                }
                slot.insert(created.clone());
                (created, None)
            }
        };
        if let Some(callback) = discarded {
            debug!(
                "作用域 '{}' 中的组件 '{}' 已由其他线程创建，销毁多余实例",
                self.name, name
            );
            callback();
        }
        Ok(instance)
    }

    fn remove(&self, name: &str) -> Option<Instance> {
        self.callbacks.lock().shift_remove(name);
        self.instances.remove(name).map(|(_, instance)| instance)
    }

    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) {
        let key = (name.to_string(), thread::current().id());
        // 正在本线程创建的实例，回调等创建结束后再决定去留
        if let Some(slot) = self.pending.lock().get_mut(&key) {
            *slot = Some(callback);
            return;
        }
        self.callbacks.lock().insert(name.to_string(), callback);
    }

    fn conversation_id(&self) -> Option<String> {
        Some(self.id.to_string())
    }
}
