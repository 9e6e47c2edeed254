//! 组件定义来源与 depends-on 关系校验

use crate::definition::ComponentDefinition;
use infrastructure_common::ContainerError;
use std::collections::HashSet;
use std::sync::Arc;

/// 组件定义来源
///
/// 容器只通过这个接口读取原始定义，定义可以来自内存注册表、配置文件或其他声明式来源
pub trait DefinitionSource: Send + Sync {
    /// 按名称获取原始定义
    fn definition(&self, name: &str) -> Option<Arc<ComponentDefinition>>;

    /// 是否存在指定名称的定义
    fn contains_definition(&self, name: &str) -> bool {
        self.definition(name).is_some()
    }

    /// 所有定义名称（按注册顺序）
    fn definition_names(&self) -> Vec<String>;
}

/// 依赖图节点
#[derive(Debug, Clone)]
pub struct DependencyGraphNode {
    /// 组件名称
    pub name: String,
    /// 显式声明的前置依赖
    pub dependencies: Vec<String>,
}

/// 循环依赖检测器
pub trait CircularDependencyDetector: Send + Sync {
    /// 检测循环依赖
    fn detect_circular_dependencies(
        &self,
        graph: &[DependencyGraphNode],
    ) -> Result<(), ContainerError>;

    /// 构建依赖图
    fn build_dependency_graph(&self, source: &dyn DefinitionSource) -> Vec<DependencyGraphNode>;
}

/// 默认循环依赖检测器
///
/// 只检查 depends-on 声明，属性引用之间的循环由早期引用处理
#[derive(Debug, Default)]
pub struct DefaultCircularDependencyDetector;

impl CircularDependencyDetector for DefaultCircularDependencyDetector {
    fn detect_circular_dependencies(
        &self,
        graph: &[DependencyGraphNode],
    ) -> Result<(), ContainerError> {
        let mut visited = HashSet::new();
        let mut visiting = Vec::new();

        for node in graph {
            if !visited.contains(node.name.as_str()) {
                Self::dfs_check(&node.name, graph, &mut visited, &mut visiting)?;
            }
        }

        Ok(())
    }

    fn build_dependency_graph(&self, source: &dyn DefinitionSource) -> Vec<DependencyGraphNode> {
        source
            .definition_names()
            .into_iter()
            .filter_map(|name| {
                let definition = source.definition(&name)?;
                Some(DependencyGraphNode {
                    name,
                    dependencies: definition.depends_on.clone(),
                })
            })
            .collect()
    }
}

impl DefaultCircularDependencyDetector {
    fn dfs_check<'a>(
        current: &'a str,
        graph: &'a [DependencyGraphNode],
        visited: &mut HashSet<&'a str>,
        visiting: &mut Vec<&'a str>,
    ) -> Result<(), ContainerError> {
        if let Some(&previous) = visiting.last() {
            if visiting.contains(&current) {
                return Err(ContainerError::DependsOnCycle {
                    name: previous.to_string(),
                    dependency: current.to_string(),
                });
            }
        }

        if visited.contains(current) {
            return Ok(());
        }

        visiting.push(current);

        if let Some(node) = graph.iter().find(|n| n.name == current) {
            for dep in &node.dependencies {
                Self::dfs_check(dep, graph, visited, visiting)?;
            }
        }

        visiting.pop();
        visited.insert(current);

        Ok(())
    }
}
