//! 依赖注入容器的集中集成测试
use di_abstractions::{
    ComponentDefinition, ContainerBuilder, DefinitionSource, DiContainer, InstanceFactory,
    PropertyValue,
};
use di_impl::{DiContainerImpl, MapScope};
use di_impl_integration_tests::{as_node, container_with, init_test_logger, CountingFactory};
use infrastructure_common::{same_instance, ContainerConfig, ContainerError, Instance};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const WORKERS: usize = 16;

async fn get_concurrently(
    container: &Arc<DiContainerImpl>,
    name: &'static str,
) -> anyhow::Result<Vec<Instance>> {
    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let container = Arc::clone(container);
            tokio::task::spawn_blocking(move || container.get(name))
        })
        .collect();

    let mut instances = Vec::with_capacity(WORKERS);
    for handle in handles {
        instances.push(handle.await??);
    }
    Ok(instances)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_singleton_created_once() -> anyhow::Result<()> {
    let factory = CountingFactory::slow(Duration::from_millis(20));
    let container = Arc::new(container_with(&factory)?);
    container.register_definition("shared", ComponentDefinition::new("Shared"))?;

    let instances = get_concurrently(&container, "shared").await?;
    assert!(instances.iter().all(|i| same_instance(i, &instances[0])));
    assert_eq!(factory.instantiations("shared"), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_circular_singletons() -> anyhow::Result<()> {
    let factory = CountingFactory::slow(Duration::from_millis(5));
    let container = Arc::new(container_with(&factory)?);
    container.register_definition(
        "a",
        ComponentDefinition::new("A").property("b", PropertyValue::reference("b")),
    )?;
    container.register_definition(
        "b",
        ComponentDefinition::new("B").property("a", PropertyValue::reference("a")),
    )?;

    let from_a = get_concurrently(&container, "a").await?;
    let from_b = get_concurrently(&container, "b").await?;

    let a = as_node(&from_a[0]);
    let b = as_node(&from_b[0]);
    assert!(Arc::ptr_eq(&a.peer("b").expect("a 应该持有 b"), &b));
    assert!(Arc::ptr_eq(&b.peer("a").expect("b 应该持有 a"), &a));
    assert_eq!(factory.instantiations("a"), 1);
    assert_eq!(factory.instantiations("b"), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_prototypes_are_independent() -> anyhow::Result<()> {
    let factory = CountingFactory::shared();
    let container = Arc::new(container_with(&factory)?);
    container.register_definition("p", ComponentDefinition::new("P").prototype())?;

    let instances = get_concurrently(&container, "p").await?;
    for (i, first) in instances.iter().enumerate() {
        for second in &instances[i + 1..] {
            assert!(!same_instance(first, second));
        }
    }
    assert_eq!(factory.instantiations("p"), WORKERS);
    Ok(())
}

#[test]
fn test_prototype_cycle_rejected() -> anyhow::Result<()> {
    let factory = CountingFactory::shared();
    let container = container_with(&factory)?;
    container.register_definition(
        "a",
        ComponentDefinition::new("A")
            .prototype()
            .property("b", PropertyValue::reference("b")),
    )?;
    container.register_definition(
        "b",
        ComponentDefinition::new("B")
            .prototype()
            .property("a", PropertyValue::reference("a")),
    )?;

    let err = container.get("a").unwrap_err();
    assert!(matches!(
        err.root_cause(),
        ContainerError::CircularPrototypeDependency { .. }
    ));
    Ok(())
}

/// 可以在容器之外修改的定义来源
#[derive(Default)]
struct EditableSource {
    definitions: RwLock<HashMap<String, Arc<ComponentDefinition>>>,
}

impl EditableSource {
    fn put(&self, name: &str, definition: ComponentDefinition) {
        self.definitions
            .write()
            .insert(name.to_string(), Arc::new(definition));
    }
}

impl DefinitionSource for EditableSource {
    fn definition(&self, name: &str) -> Option<Arc<ComponentDefinition>> {
        self.definitions.read().get(name).cloned()
    }

    fn definition_names(&self) -> Vec<String> {
        self.definitions.read().keys().cloned().collect()
    }
}

fn literal_of(container: &DiContainerImpl, name: &str, key: &str) -> anyhow::Result<String> {
    let merged = container.merged_definition(name)?;
    match merged.property(key) {
        Some(PropertyValue::Literal(literal)) => Ok(literal.value().to_string()),
        other => anyhow::bail!("属性 {key} 不是字面量: {other:?}"),
    }
}

#[test]
fn test_definition_merge_and_staleness() -> anyhow::Result<()> {
    init_test_logger();
    let source = Arc::new(EditableSource::default());
    source.put(
        "parent",
        ComponentDefinition::new("Base")
            .property("x", PropertyValue::literal("1"))
            .property("y", PropertyValue::literal("2")),
    );
    source.put(
        "child",
        ComponentDefinition::child_of("parent").property("y", PropertyValue::literal("3")),
    );
    let container = DiContainerImpl::builder()
        .with_instance_factory(CountingFactory::shared() as Arc<dyn InstanceFactory>)
        .with_definition_source(Arc::clone(&source) as Arc<dyn DefinitionSource>)
        .build()?;

    assert_eq!(literal_of(&container, "child", "x")?, "1");
    assert_eq!(literal_of(&container, "child", "y")?, "3");

    // 未失效前重复获取命中缓存
    let first = container.merged_definition("child")?;
    assert!(Arc::ptr_eq(&first, &container.merged_definition("child")?));

    source.put(
        "parent",
        ComponentDefinition::new("Base")
            .property("x", PropertyValue::literal("100"))
            .property("y", PropertyValue::literal("2")),
    );
    container.mark_stale("parent");
    container.mark_stale("child");
    assert_eq!(literal_of(&container, "child", "x")?, "100");
    assert_eq!(literal_of(&container, "child", "y")?, "3");
    Ok(())
}

#[test]
fn test_destruction_order() -> anyhow::Result<()> {
    let factory = CountingFactory::shared();
    let container = container_with(&factory)?;
    container.register_definition(
        "a",
        ComponentDefinition::new("A")
            .property("b", PropertyValue::reference("b"))
            .property(
                "c",
                PropertyValue::named_inner("c", ComponentDefinition::new("C")),
            ),
    )?;
    container.register_definition("b", ComponentDefinition::new("B"))?;

    container.get("a")?;
    container.destroy_all();

    let order = factory.destroyed();
    let position = |name: &str| order.iter().position(|n| n == name);
    assert_eq!(order.len(), 3);
    assert!(position("a") < position("b"));
    assert!(position("c") < position("b"));
    assert!(position("c") < position("a"));
    Ok(())
}

#[test]
fn test_rollback_and_retry() -> anyhow::Result<()> {
    struct FlakyFactory {
        inner: Arc<CountingFactory>,
        failures_left: parking_lot::Mutex<usize>,
    }

    impl InstanceFactory for FlakyFactory {
        fn instantiate(
            &self,
            name: &str,
            definition: &di_abstractions::MergedDefinition,
            args: &[di_abstractions::ResolvedValue],
        ) -> Result<Instance, infrastructure_common::HookError> {
            let instance = self.inner.instantiate(name, definition, args)?;
            let mut left = self.failures_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err("暂时不可用".into());
            }
            Ok(instance)
        }

        fn populate(
            &self,
            name: &str,
            definition: &di_abstractions::MergedDefinition,
            instance: &Instance,
            properties: &[(String, di_abstractions::ResolvedValue)],
        ) -> Result<(), infrastructure_common::HookError> {
            self.inner.populate(name, definition, instance, properties)
        }
    }

    let counting = CountingFactory::shared();
    let container = DiContainerImpl::builder()
        .with_instance_factory(Arc::new(FlakyFactory {
            inner: Arc::clone(&counting),
            failures_left: parking_lot::Mutex::new(1),
        }) as Arc<dyn InstanceFactory>)
        .register_definition("x", ComponentDefinition::new("X"))
        .build()?;

    let err = container.get("x").unwrap_err();
    assert!(matches!(err, ContainerError::ConstructionFailure { .. }));
    assert!(container.singleton_names().is_empty());

    let x = container.get("x")?;
    assert!(same_instance(&x, &container.get("x")?));
    assert_eq!(counting.instantiations("x"), 2);
    Ok(())
}

#[test]
fn test_container_from_config_file() -> anyhow::Result<()> {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
    writeln!(
        file,
        "allow_circular_references = false\n\n[placeholders]\nregion = \"eu-west\""
    )?;
    let config = ContainerConfig::from_file(file.path())?;

    let factory = CountingFactory::shared();
    let container = DiContainerImpl::builder()
        .with_instance_factory(Arc::clone(&factory) as Arc<dyn InstanceFactory>)
        .with_config(config)
        .register_definition(
            "router",
            ComponentDefinition::new("Router").arg(0, PropertyValue::literal("zone-${region}")),
        )
        .register_definition(
            "a",
            ComponentDefinition::new("A").property("b", PropertyValue::reference("b")),
        )
        .register_definition(
            "b",
            ComponentDefinition::new("B").property("a", PropertyValue::reference("a")),
        )
        .build()?;

    let router = as_node(&container.get("router")?);
    assert_eq!(router.args[0].as_str(), Some("zone-eu-west"));

    // 配置关闭了循环引用
    let err = container.get("a").unwrap_err();
    assert!(matches!(
        err.root_cause(),
        ContainerError::CurrentlyInCreation { .. }
    ));
    Ok(())
}

#[test]
fn test_scoped_components_are_isolated_per_scope() -> anyhow::Result<()> {
    let factory = CountingFactory::shared();
    let first = Arc::new(MapScope::new("request"));
    let container = DiContainerImpl::builder()
        .with_instance_factory(Arc::clone(&factory) as Arc<dyn InstanceFactory>)
        .with_scope("request", Arc::clone(&first) as Arc<dyn di_abstractions::Scope>)
        .register_definition("ctx", ComponentDefinition::new("Ctx").scoped("request"))
        .build()?;

    let ctx = container.get("ctx")?;
    assert!(same_instance(&ctx, &container.get("ctx")?));

    // 作用域结束后换一个新的作用域
    first.close();
    assert_eq!(factory.destroyed(), vec!["ctx".to_string()]);
    container.register_scope("request", Arc::new(MapScope::new("request")))?;
    let next = container.get("ctx")?;
    assert!(!same_instance(&ctx, &next));
    assert_eq!(factory.instantiations("ctx"), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scoped_creation_destroys_every_instance() -> anyhow::Result<()> {
    init_test_logger();
    let factory = CountingFactory::slow(Duration::from_millis(50));
    let scope = Arc::new(MapScope::new("request"));
    let container = Arc::new(
        DiContainerImpl::builder()
            .with_instance_factory(Arc::clone(&factory) as Arc<dyn InstanceFactory>)
            .with_scope("request", Arc::clone(&scope) as Arc<dyn di_abstractions::Scope>)
            .register_definition("session", ComponentDefinition::new("S").scoped("request"))
            .build()?,
    );

    let instances = get_concurrently(&container, "session").await?;
    let kept = &instances[0];
    assert!(instances.iter().all(|i| same_instance(i, kept)));

    scope.close();

    // 竞争中多创建的实例已经销毁，作用域里保留的实例在关闭时销毁
    let destroyed = factory.destroyed_instances("session");
    assert_eq!(destroyed.len(), factory.instantiations("session"));
    let last = destroyed.last().expect("关闭作用域应该销毁实例");
    assert!(same_instance(last, kept));
    assert_eq!(destroyed.iter().filter(|i| same_instance(i, kept)).count(), 1);
    Ok(())
}
