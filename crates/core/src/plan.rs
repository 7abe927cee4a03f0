//! Build plans: dependency ordering of targets using petgraph.
//!
//! A plan groups targets into levels. Every target in level N depends only on
//! targets in earlier levels, so the members of one level can render
//! concurrently.

use crate::{Error, Result, Target};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Targets ordered into dependency levels.
#[derive(Debug, Clone, Default)]
pub struct BuildPlan {
    levels: Vec<Vec<Target>>,
}

impl BuildPlan {
    /// Plan every target in `targets`.
    ///
    /// Targets sharing a name are planned once; the first occurrence wins.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a dependency is not among `targets`
    /// or the dependencies form a cycle.
    pub fn new(targets: impl IntoIterator<Item = Target>) -> Result<Self> {
        let mut graph = PlanGraph::default();
        for target in targets {
            graph.add_target(target);
        }
        graph.into_plan()
    }

    /// Plan the `requested` targets plus everything they transitively depend on.
    ///
    /// Dependencies are looked up by name through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a dependency cannot be found or the
    /// dependencies form a cycle.
    pub fn for_requested<F>(requested: impl IntoIterator<Item = Target>, mut lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<Target>,
    {
        let mut graph = PlanGraph::default();
        let mut to_process: Vec<Target> = requested.into_iter().collect();
        to_process.reverse();
        let mut seen = HashSet::new();

        while let Some(target) = to_process.pop() {
            if !seen.insert(target.name().to_string()) {
                continue;
            }
            for dep in target.depends_on().iter().rev() {
                if seen.contains(dep) {
                    continue;
                }
                if let Some(dep_target) = lookup(dep) {
                    to_process.push(dep_target);
                } else {
                    debug!(task = %target.name(), dependency = %dep, "Dependency not found");
                }
            }
            graph.add_target(target);
        }

        graph.into_plan()
    }

    /// Dependency levels in execution order.
    #[must_use]
    pub fn levels(&self) -> &[Vec<Target>] {
        &self.levels
    }

    /// All planned targets in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.levels.iter().flatten()
    }

    /// Number of planned targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Whether nothing is planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[derive(Default)]
struct PlanGraph {
    graph: DiGraph<Target, ()>,
    name_to_node: HashMap<String, NodeIndex>,
    insertion_order: Vec<NodeIndex>,
}

impl PlanGraph {
    fn add_target(&mut self, target: Target) {
        if self.name_to_node.contains_key(target.name()) {
            return;
        }
        let name = target.name().to_string();
        let node = self.graph.add_node(target);
        self.name_to_node.insert(name, node);
        self.insertion_order.push(node);
    }

    fn add_dependency_edges(&mut self) -> Result<()> {
        let mut missing = Vec::new();
        let mut edges = Vec::new();

        for &node in &self.insertion_order {
            let target = &self.graph[node];
            for dep in target.depends_on() {
                if let Some(&dep_node) = self.name_to_node.get(dep) {
                    edges.push((dep_node, node));
                } else {
                    missing.push(format!(
                        "'{}' depends on missing target '{dep}'",
                        target.name()
                    ));
                }
            }
        }

        if !missing.is_empty() {
            return Err(Error::configuration(format!(
                "Missing dependencies: {}",
                missing.join(", ")
            )));
        }

        for (from, to) in edges {
            self.graph.add_edge(from, to, ());
        }
        Ok(())
    }

    fn into_plan(mut self) -> Result<BuildPlan> {
        self.add_dependency_edges()?;

        let sorted = toposort(&self.graph, None).map_err(|cycle| {
            Error::configuration(format!(
                "Dependency cycle detected involving target '{}'",
                self.graph[cycle.node_id()].name()
            ))
        })?;

        let mut level_of: HashMap<NodeIndex, usize> = HashMap::new();
        for node in sorted {
            let level = self
                .graph
                .neighbors_directed(node, petgraph::Direction::Incoming)
                .filter_map(|dep| level_of.get(&dep))
                .map(|dep_level| dep_level + 1)
                .max()
                .unwrap_or(0);
            level_of.insert(node, level);
        }

        let depth = level_of.values().max().map_or(0, |max| max + 1);
        let mut levels: Vec<Vec<Target>> = vec![Vec::new(); depth];
        for node in &self.insertion_order {
            if let Some(&level) = level_of.get(node) {
                levels[level].push(self.graph[*node].clone());
            }
        }

        debug!(
            targets = self.insertion_order.len(),
            levels = levels.len(),
            "Built plan"
        );
        Ok(BuildPlan { levels })
    }
}
