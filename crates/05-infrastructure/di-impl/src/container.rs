//! 依赖注入容器实现
//!
//! [`DiContainerImpl`] 驱动组件的创建流程：合并定义、处理 depends-on、按作用域分派、
//! 实例化、提前暴露早期引用、注入属性、初始化以及登记销毁回调。

use crate::builder::DiContainerBuilder;
use crate::definition_registry::DefinitionRegistry;
use crate::disposal::DisposalHook;
use crate::instance_registry::InstanceRegistry;
use crate::markers::{is_prototype_in_creation, PrototypeCreationGuard};
use crate::merge::DefinitionMerger;
use crate::value_resolver::ValueResolver;
use chrono::{DateTime, Utc};
use di_abstractions::{
    CircularDependencyDetector, ComponentDefinition, ComponentPostProcessor, ContainerStats,
    DefaultCircularDependencyDetector, DefinitionSource, DiContainer, ExpressionEvaluator,
    InstanceFactory, MergedDefinition, ResolvedValue, Scope,
};
use infrastructure_common::{
    same_instance, ConfigError, ContainerConfig, ContainerError, CreationState, Instance, Lifetime,
    SCOPE_PROTOTYPE, SCOPE_SINGLETON,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};
use uuid::Uuid;

/// 具体的依赖注入容器实现
pub struct DiContainerImpl {
    id: Uuid,
    created_at: DateTime<Utc>,
    config: ContainerConfig,
    definitions: Arc<DefinitionRegistry>,
    merger: Arc<DefinitionMerger>,
    registry: InstanceRegistry,
    parent: Option<Arc<DiContainerImpl>>,
    instance_factory: Arc<dyn InstanceFactory>,
    post_processors: Vec<Arc<dyn ComponentPostProcessor>>,
    scopes: RwLock<HashMap<String, Arc<dyn Scope>>>,
    evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    inner_counter: AtomicUsize,
}

impl DiContainerImpl {
    /// 使用默认配置创建空容器
    pub fn new(instance_factory: Arc<dyn InstanceFactory>) -> Self {
        Self::from_parts(ContainerConfig::default(), instance_factory, None, None, Vec::new(), None)
    }

    /// 容器构建器
    pub fn builder() -> DiContainerBuilder {
        DiContainerBuilder::new()
    }

    pub(crate) fn from_parts(
        config: ContainerConfig,
        instance_factory: Arc<dyn InstanceFactory>,
        source: Option<Arc<dyn DefinitionSource>>,
        parent: Option<Arc<DiContainerImpl>>,
        post_processors: Vec<Arc<dyn ComponentPostProcessor>>,
        evaluator: Option<Arc<dyn ExpressionEvaluator>>,
    ) -> Self {
        let mut definitions = DefinitionRegistry::new(config.allow_definition_overriding);
        if let Some(source) = source {
            definitions = definitions.with_fallback(source);
        }
        let definitions = Arc::new(definitions);
        let merger = Arc::new(DefinitionMerger::new(
            Arc::clone(&definitions) as Arc<dyn DefinitionSource>,
            parent.as_ref().map(|p| Arc::clone(&p.merger)),
            config.cache_metadata,
        ));
        let id = Uuid::new_v4();
        debug!("创建依赖注入容器: {}", id);

        Self {
            id,
            created_at: Utc::now(),
            registry: InstanceRegistry::new(config.suppressed_error_limit),
            config,
            definitions,
            merger,
            parent,
            instance_factory,
            post_processors,
            scopes: RwLock::new(HashMap::new()),
            evaluator,
            inner_counter: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 父容器
    pub fn parent(&self) -> Option<&Arc<DiContainerImpl>> {
        self.parent.as_ref()
    }

    pub(crate) fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub(crate) fn merger(&self) -> &DefinitionMerger {
        &self.merger
    }

    pub(crate) fn evaluator(&self) -> Option<&Arc<dyn ExpressionEvaluator>> {
        self.evaluator.as_ref()
    }

    // ---- 注册 ----

    /// 注册组件定义
    ///
    /// 覆盖已有定义时，旧定义派生出的合并定义全部过期，已创建的单例被销毁
    pub fn register_definition(
        &self,
        name: impl Into<String>,
        definition: ComponentDefinition,
    ) -> Result<(), ContainerError> {
        let name = name.into();
        let previous = self.definitions.register(&name, definition)?;
        self.merger.invalidate(&name);
        if previous.is_some() || self.registry.contains_singleton(&name) {
            self.registry.destroy_singleton(&name);
        }
        Ok(())
    }

    /// 移除组件定义，同时销毁已创建的单例
    pub fn remove_definition(&self, name: &str) -> Result<(), ContainerError> {
        if self.definitions.remove(name).is_none() {
            return Err(ContainerError::no_such_component(name));
        }
        info!("移除组件定义: {}", name);
        self.merger.invalidate(name);
        self.registry.destroy_singleton(name);
        Ok(())
    }

    /// 直接注册外部创建的单例实例
    pub fn register_instance(
        &self,
        name: impl Into<String>,
        instance: Instance,
    ) -> Result<(), ContainerError> {
        self.registry.register_singleton(&name.into(), instance)
    }

    /// 注册自定义作用域，单例与原型为保留名称
    pub fn register_scope(
        &self,
        name: impl Into<String>,
        scope: Arc<dyn Scope>,
    ) -> Result<(), ContainerError> {
        let name = name.into();
        if name == SCOPE_SINGLETON || name == SCOPE_PROTOTYPE {
            return Err(ConfigError::ValidationError {
                message: format!("不能替换内置作用域 '{name}'"),
            }
            .into());
        }
        info!("注册作用域: {}", name);
        self.scopes.write().insert(name, scope);
        Ok(())
    }

    fn scope(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.scopes.read().get(name).cloned()
    }

    // ---- 合并定义缓存 ----

    /// 获取合并后的定义
    pub fn merged_definition(&self, name: &str) -> Result<Arc<MergedDefinition>, ContainerError> {
        self.merger.merged(name)
    }

    /// 标记合并定义过期
    pub fn mark_stale(&self, name: &str) {
        self.merger.mark_stale(name);
    }

    /// 让尚未用于创建实例的合并定义全部过期
    pub fn clear_metadata_cache(&self) {
        self.merger.clear_metadata_cache();
    }

    // ---- 获取组件 ----

    /// 获取组件的完整流程
    pub(crate) fn do_get(
        &self,
        name: &str,
        args: Option<&[ResolvedValue]>,
    ) -> Result<Instance, ContainerError> {
        if let Some(shared) = self.registry.get_raw(name, true)? {
            if args.is_some() {
                trace!("单例组件 '{}' 已存在，忽略显式构造参数", name);
            }
            return Ok(shared);
        }

        if is_prototype_in_creation(self.id, name) {
            return Err(ContainerError::CircularPrototypeDependency {
                name: name.to_string(),
            });
        }

        if !self.definitions.contains_definition(name) {
            if let Some(parent) = &self.parent {
                trace!("组件 '{}' 交给父容器获取", name);
                return parent.do_get(name, args);
            }
        }

        self.merger.mark_as_created(name);
        let result = self.create_by_scope(name, args);
        if result.is_err() {
            self.merger.cleanup_after_failure(name);
        }
        result
    }

    fn create_by_scope(
        &self,
        name: &str,
        args: Option<&[ResolvedValue]>,
    ) -> Result<Instance, ContainerError> {
        let merged = self.merger.merged(name)?;
        if merged.is_abstract() {
            return Err(ContainerError::AbstractDefinition {
                name: name.to_string(),
            });
        }

        for dependency in merged.depends_on() {
            if self.registry.is_dependent(name, dependency) {
                return Err(ContainerError::DependsOnCycle {
                    name: name.to_string(),
                    dependency: dependency.clone(),
                });
            }
            self.registry.register_dependent(dependency, name);
            self.do_get(dependency, None)
                .map_err(|e| ContainerError::ReferenceFailure {
                    name: name.to_string(),
                    label: format!("depends-on 声明 '{dependency}'"),
                    source: Box::new(e),
                    related_causes: Vec::new(),
                })?;
        }

        match merged.scope() {
            Lifetime::Singleton => self.registry.get_or_create(name, || {
                self.create_component(name, &merged, args).map_err(|e| {
                    // 清除可能已暴露的早期引用以及拿到早期引用的组件
                    self.registry.destroy_singleton(name);
                    e
                })
            }),
            Lifetime::Prototype => {
                let _guard = PrototypeCreationGuard::enter(self.id, name);
                self.create_component(name, &merged, args)
            }
            Lifetime::Scoped(scope_name) => {
                let scope = self.scope(scope_name).ok_or_else(|| ContainerError::UnknownScope {
                    name: name.to_string(),
                    scope: scope_name.clone(),
                })?;
                scope.get(name, &|| {
                    let _guard = PrototypeCreationGuard::enter(self.id, name);
                    self.create_component(name, &merged, args)
                })
            }
        }
    }

    /// 创建组件实例（不经过任何缓存）
    pub(crate) fn create_component(
        &self,
        name: &str,
        merged: &Arc<MergedDefinition>,
        args: Option<&[ResolvedValue]>,
    ) -> Result<Instance, ContainerError> {
        debug!("创建组件实例: {} (作用域: {})", name, merged.scope());
        let resolver = ValueResolver::new(self, name, merged);

        let args = match args {
            Some(explicit) => explicit.to_vec(),
            None => resolver.resolve_constructor_args()?,
        };
        let raw = self
            .instance_factory
            .instantiate(name, merged, &args)
            .map_err(|e| ContainerError::hook_failure(name, "实例化失败", e))?;

        let early_exposure = merged.is_singleton()
            && self.config.allow_circular_references
            && self.registry.is_in_creation(name);
        if early_exposure {
            debug!("提前暴露单例组件 '{}' 以解决潜在的循环引用", name);
            let processors = self.post_processors.clone();
            let early_name = name.to_string();
            let early_raw = Arc::clone(&raw);
            self.registry.register_factory(
                name,
                Box::new(move || apply_early_reference(&processors, &early_name, early_raw)),
            );
        }

        let properties = resolver.resolve_properties()?;
        self.instance_factory
            .populate(name, merged, &raw, &properties)
            .map_err(|e| ContainerError::hook_failure(name, "属性注入失败", e))?;
        let mut exposed = self.initialize_component(name, merged, Arc::clone(&raw))?;

        if early_exposure {
            if let Some(early) = self.registry.get_raw(name, false)? {
                if same_instance(&exposed, &raw) {
                    exposed = early;
                } else if !same_instance(&exposed, &early) && self.registry.has_dependents(name) {
                    return Err(ContainerError::EarlyReferenceMismatch {
                        name: name.to_string(),
                    });
                }
            }
        }

        self.register_disposal(name, merged, &exposed)?;
        Ok(exposed)
    }

    fn initialize_component(
        &self,
        name: &str,
        merged: &MergedDefinition,
        raw: Instance,
    ) -> Result<Instance, ContainerError> {
        let mut current = raw;
        for processor in &self.post_processors {
            current = processor
                .before_initialization(name, current)
                .map_err(|e| ContainerError::hook_failure(name, "初始化前置处理失败", e))?;
        }

        self.instance_factory
            .initialize(name, merged, &current)
            .map_err(|e| ContainerError::hook_failure(name, "初始化回调执行失败", e))?;

        for processor in &self.post_processors {
            current = processor
                .after_initialization(name, current)
                .map_err(|e| ContainerError::hook_failure(name, "初始化后置处理失败", e))?;
        }
        Ok(current)
    }

    fn register_disposal(
        &self,
        name: &str,
        merged: &Arc<MergedDefinition>,
        instance: &Instance,
    ) -> Result<(), ContainerError> {
        if merged.is_prototype() {
            return Ok(());
        }
        let Some(hook) = DisposalHook::for_instance(
            name,
            instance,
            merged,
            &self.instance_factory,
            &self.post_processors,
        ) else {
            return Ok(());
        };

        match merged.scope() {
            Lifetime::Singleton => self.registry.register_disposable(name, hook),
            Lifetime::Scoped(scope_name) => {
                let scope = self.scope(scope_name).ok_or_else(|| ContainerError::UnknownScope {
                    name: name.to_string(),
                    scope: scope_name.clone(),
                })?;
                scope.register_destruction_callback(name, Box::new(move || hook.run()));
            }
            Lifetime::Prototype => {}
        }
        Ok(())
    }

    /// 生成匿名内部组件名称
    pub(crate) fn generate_inner_name(&self) -> String {
        let id = self.inner_counter.fetch_add(1, Ordering::Relaxed);
        format!("{}#{:x}", self.config.inner_name_prefix, id)
    }

    /// 名称是否已被本地定义、单例或依赖关系占用
    pub(crate) fn is_name_in_use(&self, name: &str) -> bool {
        self.definitions.contains_local(name)
            || self.registry.contains_singleton(name)
            || self.registry.has_dependents(name)
    }

    /// 本容器或祖先容器中是否存在组件
    pub(crate) fn contains_component(&self, name: &str) -> bool {
        self.registry.contains_singleton(name)
            || self.definitions.contains_definition(name)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.contains_component(name))
    }

    // ---- 销毁 ----

    /// 对容器不跟踪的实例（如原型实例）执行销毁回调
    pub fn destroy_instance(&self, name: &str, instance: &Instance) -> Result<(), ContainerError> {
        let merged = self.merger.merged(name)?;
        if let Some(hook) = DisposalHook::for_instance(
            name,
            instance,
            &merged,
            &self.instance_factory,
            &self.post_processors,
        ) {
            hook.run();
        }
        Ok(())
    }

    fn destroy_scoped(&self, name: &str, merged: &Arc<MergedDefinition>, scope_name: &str) {
        let Some(scope) = self.scope(scope_name) else {
            return;
        };
        if let Some(instance) = scope.remove(name) {
            debug!("从作用域 '{}' 移除并销毁组件: {}", scope_name, name);
            if let Some(hook) = DisposalHook::for_instance(
                name,
                &instance,
                merged,
                &self.instance_factory,
                &self.post_processors,
            ) {
                hook.run();
            }
        }
    }

    // ---- 自省 ----

    /// 已注册的单例名称（按注册顺序）
    pub fn singleton_names(&self) -> Vec<String> {
        self.registry.singleton_names()
    }

    /// 依赖指定组件的组件
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.registry.dependents_of(name)
    }

    /// 指定组件依赖的组件
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.registry.dependencies_of(name)
    }

    /// 指定组件的内部组件
    pub fn contained_of(&self, name: &str) -> Vec<String> {
        self.registry.contained_of(name)
    }

    /// 单例组件的创建状态
    pub fn creation_state(&self, name: &str) -> CreationState {
        self.registry.creation_state(name)
    }

    /// 本地定义名称（按注册顺序，包括后备来源）
    pub fn definition_names(&self) -> Vec<String> {
        self.definitions.definition_names()
    }

    /// 统计信息
    pub fn stats(&self) -> ContainerStats {
        ContainerStats {
            registered_definitions: self.definitions.len(),
            active_singletons: self.registry.singleton_count(),
            merged_definitions: self.merger.cached_count(),
            disposable_singletons: self.registry.disposable_count(),
            registered_scopes: self.scopes.read().len(),
        }
    }

    /// 不创建任何实例，校验所有定义
    ///
    /// 检查父定义是否可解析、depends-on 目标是否存在以及 depends-on 是否成环
    pub fn validate(&self) -> Result<(), ContainerError> {
        let names = self.definitions.definition_names();
        info!("校验 {} 个组件定义", names.len());

        for name in &names {
            let merged = self.merger.merged(name)?;
            for dependency in merged.depends_on() {
                if !self.contains_component(dependency) {
                    return Err(ContainerError::UnsatisfiedReference {
                        name: name.clone(),
                        label: "depends-on 声明".to_string(),
                        target: dependency.clone(),
                        reason: "目标组件未定义".to_string(),
                    });
                }
            }
        }

        let detector = DefaultCircularDependencyDetector;
        let graph = detector.build_dependency_graph(self.definitions.as_ref());
        detector.detect_circular_dependencies(&graph)
    }
}

impl DiContainer for DiContainerImpl {
    fn get(&self, name: &str) -> Result<Instance, ContainerError> {
        self.do_get(name, None)
    }

    fn get_with_args(
        &self,
        name: &str,
        args: &[ResolvedValue],
    ) -> Result<Instance, ContainerError> {
        self.do_get(name, Some(args))
    }

    fn contains(&self, name: &str) -> bool {
        self.contains_component(name)
    }

    fn is_singleton(&self, name: &str) -> Result<bool, ContainerError> {
        if self.registry.contains_singleton(name) {
            return Ok(true);
        }
        if !self.definitions.contains_definition(name) {
            if let Some(parent) = &self.parent {
                return parent.is_singleton(name);
            }
        }
        Ok(self.merger.merged(name)?.is_singleton())
    }

    fn is_prototype(&self, name: &str) -> Result<bool, ContainerError> {
        if !self.definitions.contains_definition(name) {
            if let Some(parent) = &self.parent {
                return parent.is_prototype(name);
            }
            if self.registry.contains_singleton(name) {
                return Ok(false);
            }
        }
        Ok(self.merger.merged(name)?.is_prototype())
    }

    fn destroy(&self, name: &str) {
        if let Ok(merged) = self.merger.merged(name) {
            if let Lifetime::Scoped(scope_name) = merged.scope() {
                self.destroy_scoped(name, &merged, scope_name);
                return;
            }
        }
        self.registry.destroy_singleton(name);
    }

    fn destroy_all(&self) {
        info!("销毁容器 {} 中的所有单例", self.id);
        self.registry.destroy_singletons();
    }
}

/// 依次调用后置处理器的早期引用回调
fn apply_early_reference(
    processors: &[Arc<dyn ComponentPostProcessor>],
    name: &str,
    raw: Instance,
) -> Result<Instance, ContainerError> {
    processors.iter().try_fold(raw, |current, processor| {
        processor
            .early_reference(name, current)
            .map_err(|e| ContainerError::hook_failure(name, "获取早期引用失败", e))
    })
}
