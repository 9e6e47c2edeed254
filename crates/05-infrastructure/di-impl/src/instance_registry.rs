//! 单例实例注册表
//!
//! 每个组件名称同一时刻最多处于三层缓存中的一层：
//!
//! 1. 完全初始化的实例
//! 2. 已暴露的早期引用（尚未完成属性注入）
//! 3. 尚未调用的早期引用工厂
//!
//! 层级之间的迁移以及单例创建标记都在同一把全局（可重入）锁内完成，
//! 依赖关系表使用各自独立的锁。

use crate::disposal::DisposalHook;
use dashmap::{DashMap, DashSet};
use indexmap::{IndexMap, IndexSet};
use infrastructure_common::{ContainerError, CreationState, Instance};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace, warn};

/// 早期引用工厂，最多调用一次
pub type EarlyReferenceFactory = Box<dyn FnOnce() -> Result<Instance, ContainerError> + Send>;

#[derive(Default)]
struct SingletonState {
    /// 第二层：早期引用
    early: HashMap<String, Instance>,
    /// 第三层：早期引用工厂
    factories: HashMap<String, EarlyReferenceFactory>,
    /// 按注册顺序记录的单例名称
    registered: IndexSet<String>,
    /// 最外层创建过程中被抑制的错误
    suppressed: Option<Vec<ContainerError>>,
    in_destruction: bool,
}

type StateGuard<'a> = ReentrantMutexGuard<'a, RefCell<SingletonState>>;

/// 单例实例注册表
pub struct InstanceRegistry {
    /// 第一层：完全初始化的实例，读取无需加锁
    completed: DashMap<String, Instance>,
    state: ReentrantMutex<RefCell<SingletonState>>,
    in_creation: DashSet<String>,
    disposables: Mutex<IndexMap<String, DisposalHook>>,
    /// 外部组件 -> 内部组件
    contained: Mutex<IndexMap<String, IndexSet<String>>>,
    /// 组件 -> 依赖它的组件
    dependents: Mutex<IndexMap<String, IndexSet<String>>>,
    /// 组件 -> 它依赖的组件
    dependencies: Mutex<IndexMap<String, IndexSet<String>>>,
    suppressed_limit: usize,
}

impl InstanceRegistry {
    pub fn new(suppressed_limit: usize) -> Self {
        Self {
            completed: DashMap::new(),
            state: ReentrantMutex::new(RefCell::new(SingletonState::default())),
            in_creation: DashSet::new(),
            disposables: Mutex::new(IndexMap::new()),
            contained: Mutex::new(IndexMap::new()),
            dependents: Mutex::new(IndexMap::new()),
            dependencies: Mutex::new(IndexMap::new()),
            suppressed_limit,
        }
    }

    /// 获取单例实例
    ///
    /// 第一层未命中且组件正在创建时依次查找第二层与第三层；
    /// 第三层工厂只在 `allow_early` 为真时调用，结果移入第二层
    pub fn get_raw(
        &self,
        name: &str,
        allow_early: bool,
    ) -> Result<Option<Instance>, ContainerError> {
        if let Some(instance) = self.completed.get(name) {
            trace!("单例缓存命中: {}", name);
            return Ok(Some(instance.clone()));
        }
        if !self.in_creation.contains(name) {
            return Ok(None);
        }

        let guard = self.state.lock();
        if let Some(instance) = self.completed.get(name) {
            return Ok(Some(instance.clone()));
        }
        if let Some(early) = guard.borrow().early.get(name) {
            trace!("早期引用缓存命中: {}", name);
            return Ok(Some(early.clone()));
        }
        if !allow_early {
            return Ok(None);
        }

        let factory = guard.borrow_mut().factories.remove(name);
        let Some(factory) = factory else {
            return Ok(None);
        };
        debug!("获取正在创建的单例组件的早期引用: {}", name);
        let early = factory()?;
        guard
            .borrow_mut()
            .early
            .insert(name.to_string(), early.clone());
        Ok(Some(early))
    }

    /// 注册已创建好的单例实例
    pub fn register_singleton(&self, name: &str, instance: Instance) -> Result<(), ContainerError> {
        let guard = self.state.lock();
        if self.completed.contains_key(name) {
            return Err(ContainerError::DuplicateSingleton {
                name: name.to_string(),
            });
        }
        self.add_singleton(&guard, name, instance);
        info!("注册单例实例: {}", name);
        Ok(())
    }

    /// 注册早期引用工厂（第三层）
    ///
    /// 第一层已有实例时忽略
    pub fn register_factory(&self, name: &str, factory: EarlyReferenceFactory) {
        let guard = self.state.lock();
        if self.completed.contains_key(name) {
            return;
        }
        let mut state = guard.borrow_mut();
        state.factories.insert(name.to_string(), factory);
        state.early.remove(name);
        state.registered.insert(name.to_string());
    }

    /// 把实例移入第一层，清除第二层与第三层
    pub fn promote(&self, name: &str, instance: Instance) {
        let guard = self.state.lock();
        self.add_singleton(&guard, name, instance);
    }

    fn add_singleton(&self, guard: &StateGuard<'_>, name: &str, instance: Instance) {
        self.completed.insert(name.to_string(), instance);
        let mut state = guard.borrow_mut();
        state.early.remove(name);
        state.factories.remove(name);
        state.registered.insert(name.to_string());
    }

    /// 返回已存在的单例，不存在时在全局锁内调用 `factory` 创建
    ///
    /// 创建失败时该名称从所有层级移除，最外层调用把期间被抑制的错误附加到返回的错误上
    pub fn get_or_create<F>(&self, name: &str, factory: F) -> Result<Instance, ContainerError>
    where
        F: FnOnce() -> Result<Instance, ContainerError>,
    {
        let guard = self.state.lock();
        if let Some(instance) = self.completed.get(name) {
            return Ok(instance.clone());
        }
        if guard.borrow().in_destruction {
            return Err(ContainerError::CreationNotAllowed {
                name: name.to_string(),
            });
        }

        debug!("创建单例组件: {}", name);
        if !self.in_creation.insert(name.to_string()) {
            return Err(ContainerError::CurrentlyInCreation {
                name: name.to_string(),
            });
        }

        let outermost = {
            let mut state = guard.borrow_mut();
            if state.suppressed.is_none() {
                state.suppressed = Some(Vec::new());
                true
            } else {
                false
            }
        };

        let result = factory();

        self.in_creation.remove(name);
        let suppressed = if outermost {
            guard.borrow_mut().suppressed.take()
        } else {
            None
        };

        match result {
            Ok(instance) => {
                self.add_singleton(&guard, name, instance.clone());
                Ok(instance)
            }
            Err(err) => {
                // 创建过程中可能已经隐式注册
                if let Some(instance) = self.completed.get(name) {
                    return Ok(instance.clone());
                }
                self.evict(&guard, name);
                Err(self.attach_suppressed(name, err, suppressed.unwrap_or_default()))
            }
        }
    }

    fn attach_suppressed(
        &self,
        name: &str,
        err: ContainerError,
        suppressed: Vec<ContainerError>,
    ) -> ContainerError {
        if suppressed.is_empty() {
            return err;
        }
        let (err, rest) = err.with_related_causes(suppressed);
        for cause in rest {
            warn!("组件 '{}' 创建失败，被抑制的错误: {}", name, cause);
        }
        err
    }

    fn evict(&self, guard: &StateGuard<'_>, name: &str) {
        self.completed.remove(name);
        let mut state = guard.borrow_mut();
        state.early.remove(name);
        state.factories.remove(name);
        state.registered.shift_remove(name);
    }

    /// 记录被抑制的错误，超出上限的部分不再记录
    pub fn on_suppressed(&self, err: ContainerError) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        match state.suppressed.as_mut() {
            Some(list) if list.len() < self.suppressed_limit => list.push(err),
            Some(_) => trace!("被抑制的错误超出上限，忽略: {}", err),
            None => {}
        }
    }

    /// 从所有层级移除单例
    pub fn remove_singleton(&self, name: &str) {
        let guard = self.state.lock();
        self.evict(&guard, name);
    }

    /// 第一层是否存在实例
    pub fn contains_singleton(&self, name: &str) -> bool {
        self.completed.contains_key(name)
    }

    /// 已注册的单例名称（按注册顺序）
    pub fn singleton_names(&self) -> Vec<String> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.registered.iter().cloned().collect()
    }

    /// 第一层实例数量
    pub fn singleton_count(&self) -> usize {
        self.completed.len()
    }

    pub fn is_in_creation(&self, name: &str) -> bool {
        self.in_creation.contains(name)
    }

    /// 单例组件当前的创建状态
    pub fn creation_state(&self, name: &str) -> CreationState {
        if self.completed.contains_key(name) {
            return CreationState::Created;
        }
        let guard = self.state.lock();
        let state = guard.borrow();
        if state.early.contains_key(name) {
            CreationState::EarlyExposed
        } else if state.factories.contains_key(name) || self.in_creation.contains(name) {
            CreationState::InCreation
        } else {
            CreationState::Absent
        }
    }

    /// 注册销毁回调
    pub fn register_disposable(&self, name: &str, hook: DisposalHook) {
        self.disposables.lock().insert(name.to_string(), hook);
    }

    pub fn disposable_count(&self) -> usize {
        self.disposables.lock().len()
    }

    /// 登记内部组件，内部组件在外部组件之前销毁
    pub fn register_contained(&self, contained: &str, containing: &str) {
        {
            let mut map = self.contained.lock();
            let set = map.entry(containing.to_string()).or_default();
            if !set.insert(contained.to_string()) {
                return;
            }
        }
        self.register_dependent(contained, containing);
    }

    /// 登记依赖关系：`dependent` 依赖 `name`
    pub fn register_dependent(&self, name: &str, dependent: &str) {
        {
            let mut dependents = self.dependents.lock();
            let set = dependents.entry(name.to_string()).or_default();
            if !set.insert(dependent.to_string()) {
                return;
            }
        }
        self.dependencies
            .lock()
            .entry(dependent.to_string())
            .or_default()
            .insert(name.to_string());
    }

    /// `dependent` 是否直接或间接依赖 `name`
    pub fn is_dependent(&self, name: &str, dependent: &str) -> bool {
        let mut seen = HashSet::new();
        self.is_dependent_inner(name, dependent, &mut seen)
    }

    fn is_dependent_inner(&self, name: &str, dependent: &str, seen: &mut HashSet<String>) -> bool {
        if seen.contains(name) {
            return false;
        }
        let direct = self.dependents.lock().get(name).cloned();
        let Some(direct) = direct else {
            return false;
        };
        if direct.contains(dependent) {
            return true;
        }
        seen.insert(name.to_string());
        direct
            .iter()
            .any(|transitive| self.is_dependent_inner(transitive, dependent, seen))
    }

    pub fn has_dependents(&self, name: &str) -> bool {
        self.dependents
            .lock()
            .get(name)
            .is_some_and(|set| !set.is_empty())
    }

    /// 依赖指定组件的组件
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        Self::edges(&self.dependents, name)
    }

    /// 指定组件依赖的组件
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        Self::edges(&self.dependencies, name)
    }

    /// 指定组件的内部组件
    pub fn contained_of(&self, name: &str) -> Vec<String> {
        Self::edges(&self.contained, name)
    }

    fn edges(map: &Mutex<IndexMap<String, IndexSet<String>>>, name: &str) -> Vec<String> {
        map.lock()
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// 按注册的逆序销毁所有单例，然后清空所有缓存与依赖关系
    pub fn destroy_singletons(&self) {
        info!("销毁所有单例组件");
        {
            let guard = self.state.lock();
            guard.borrow_mut().in_destruction = true;
        }

        let names: Vec<String> = self.disposables.lock().keys().cloned().collect();
        for name in names.iter().rev() {
            self.destroy_singleton(name);
        }

        self.contained.lock().clear();
        self.dependents.lock().clear();
        self.dependencies.lock().clear();

        let guard = self.state.lock();
        self.completed.clear();
        let mut state = guard.borrow_mut();
        state.early.clear();
        state.factories.clear();
        state.registered.clear();
        state.in_destruction = false;
    }

    /// 销毁指定单例
    ///
    /// 顺序：依赖它的组件、它的内部组件、它自身的销毁回调
    pub fn destroy_singleton(&self, name: &str) {
        self.remove_singleton(name);
        let hook = self.disposables.lock().shift_remove(name);
        self.destroy_component(name, hook);
    }

    fn destroy_component(&self, name: &str, hook: Option<DisposalHook>) {
        let dependents = self.dependents.lock().shift_remove(name);
        if let Some(dependents) = dependents {
            debug!("组件 '{}' 销毁前先销毁依赖它的组件: {:?}", name, dependents);
            for dependent in &dependents {
                self.destroy_singleton(dependent);
            }
        }

        let contained = self.contained.lock().shift_remove(name);
        if let Some(contained) = contained {
            for inner in &contained {
                self.destroy_singleton(inner);
            }
        }

        if let Some(hook) = hook {
            hook.run();
        }

        self.dependents.lock().retain(|_, set| {
            set.shift_remove(name);
            !set.is_empty()
        });
        self.dependencies.lock().shift_remove(name);
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new(infrastructure_common::DEFAULT_SUPPRESSED_ERROR_LIMIT)
    }
}
