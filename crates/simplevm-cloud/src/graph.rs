//! Resource dependency graph
//!
//! Resources are declared in any order. Edges come from output references
//! inside a resource's configuration (implicit) and from
//! `ResourceOptions::depends_on` (explicit). The graph is layered into
//! *waves*: every resource in a wave depends only on resources in earlier
//! waves, so a wave can be applied concurrently.

use crate::error::{CloudError, Result};
use crate::provider::ResourceConfig;
use crate::state::GlobalState;
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};

/// Declared resources and their dependency edges
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    resources: Vec<ResourceConfig>,
    index: HashMap<String, usize>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource
    pub fn add(&mut self, resource: ResourceConfig) -> Result<()> {
        let key = resource.key();
        if self.index.contains_key(&key) {
            return Err(CloudError::DuplicateResource(key));
        }
        tracing::trace!("Declared resource {}", key);
        self.index.insert(key, self.resources.len());
        self.resources.push(resource);
        Ok(())
    }

    /// Rebuild a graph of recorded resources from state
    ///
    /// Dependencies on resources no longer recorded are dropped.
    pub fn from_state(state: &GlobalState) -> Self {
        let mut keys: Vec<&String> = state.resources.keys().collect();
        keys.sort();

        let mut graph = Self::new();
        for key in keys {
            let recorded = &state.resources[key];
            let id = key
                .strip_prefix(&format!("{}:", recorded.resource_type))
                .unwrap_or(key);

            let mut resource = ResourceConfig::new(
                &recorded.resource_type,
                id,
                &recorded.provider,
                serde_json::Value::Null,
            );
            resource.options.depends_on = recorded
                .dependencies
                .iter()
                .filter(|dep| state.resources.contains_key(*dep))
                .cloned()
                .collect();

            // Keys are unique in the state map
            let _ = graph.add(resource);
        }
        graph
    }

    pub fn get(&self, key: &str) -> Option<&ResourceConfig> {
        self.index.get(key).map(|&i| &self.resources[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.iter()
    }

    /// Build the petgraph representation (edge: dependency -> dependent)
    fn build(&self) -> Result<DiGraph<usize, ()>> {
        let mut graph = DiGraph::with_capacity(self.resources.len(), self.resources.len());
        let nodes: Vec<NodeIndex> = (0..self.resources.len())
            .map(|i| graph.add_node(i))
            .collect();

        for (i, resource) in self.resources.iter().enumerate() {
            for dep in resource.dependencies() {
                let &from = self.index.get(&dep).ok_or_else(|| {
                    CloudError::ResourceNotFound(format!(
                        "{} (referenced by {})",
                        dep,
                        resource.key()
                    ))
                })?;
                graph.update_edge(nodes[from], nodes[i], ());
            }
        }

        Ok(graph)
    }

    fn cycle_error(&self, graph: &DiGraph<usize, ()>) -> CloudError {
        let cycles: Vec<String> = tarjan_scc(graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || scc.iter().any(|&n| graph.contains_edge(n, n))
            })
            .map(|scc| {
                scc.into_iter()
                    .map(|n| self.resources[graph[n]].key())
                    .collect::<Vec<_>>()
                    .join(" <-> ")
            })
            .collect();
        CloudError::DependencyCycle(cycles.join("; "))
    }

    /// Layer the graph into waves of mutually independent resources
    pub fn waves(&self) -> Result<Vec<Vec<&ResourceConfig>>> {
        let graph = self.build()?;

        let mut in_degree: Vec<usize> = graph
            .node_indices()
            .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut current: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .collect();

        let mut waves = Vec::new();
        let mut placed = 0;

        while !current.is_empty() {
            current.sort_by_key(|n| graph[*n]);
            placed += current.len();

            let mut next = Vec::new();
            for &node in &current {
                for dependent in graph.neighbors_directed(node, Direction::Outgoing) {
                    in_degree[dependent.index()] -= 1;
                    if in_degree[dependent.index()] == 0 {
                        next.push(dependent);
                    }
                }
            }

            waves.push(current.iter().map(|n| &self.resources[graph[*n]]).collect());
            current = next;
        }

        if placed != self.resources.len() {
            return Err(self.cycle_error(&graph));
        }

        Ok(waves)
    }

    /// Topological order; dependencies always precede their dependents
    pub fn execution_order(&self) -> Result<Vec<&ResourceConfig>> {
        Ok(self.waves()?.into_iter().flatten().collect())
    }

    /// Keys of every resource that depends on `key`, directly or transitively
    pub fn dependents(&self, key: &str) -> Result<Vec<String>> {
        let graph = self.build()?;
        let Some(&start) = self.index.get(key) else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([NodeIndex::new(start)]);
        let mut dependents = Vec::new();

        while let Some(current) = queue.pop_front() {
            for neighbor in graph.neighbors_directed(current, Direction::Outgoing) {
                if seen.insert(neighbor) {
                    dependents.push(self.resources[graph[neighbor]].key());
                    queue.push_back(neighbor);
                }
            }
        }

        Ok(dependents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ResourceOptions;
    use crate::state::ResourceState;
    use serde_json::json;

    fn resource(kind: &str, id: &str, refs: &[&str]) -> ResourceConfig {
        let refs: Vec<serde_json::Value> = refs
            .iter()
            .map(|key| crate::OutputRef::new(*key, "id").to_value())
            .collect();
        ResourceConfig::new(kind, id, "test", json!({ "refs": refs }))
    }

    fn keys(wave: &[&ResourceConfig]) -> Vec<String> {
        wave.iter().map(|r| r.key()).collect()
    }

    /// rg -> (vnet, nsg, ip); vnet + nsg -> subnet; subnet + ip -> nic; nic -> vm
    fn vm_graph() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        // Declared out of order on purpose
        graph.add(resource("vm", "vm", &["nic:nic"])).unwrap();
        graph.add(resource("group", "rg", &[])).unwrap();
        graph.add(resource("vnet", "net", &["group:rg"])).unwrap();
        graph.add(resource("nsg", "fw", &["group:rg"])).unwrap();
        graph
            .add(resource("subnet", "sub", &["vnet:net", "nsg:fw"]))
            .unwrap();
        graph.add(resource("ip", "pip", &["group:rg"])).unwrap();
        graph
            .add(resource("nic", "nic", &["subnet:sub", "ip:pip"]))
            .unwrap();
        graph
    }

    #[test]
    fn test_waves() {
        let graph = vm_graph();
        let waves = graph.waves().unwrap();

        assert_eq!(waves.len(), 5);
        assert_eq!(keys(&waves[0]), vec!["group:rg"]);
        assert_eq!(keys(&waves[1]), vec!["vnet:net", "nsg:fw", "ip:pip"]);
        assert_eq!(keys(&waves[2]), vec!["subnet:sub"]);
        assert_eq!(keys(&waves[3]), vec!["nic:nic"]);
        assert_eq!(keys(&waves[4]), vec!["vm:vm"]);
    }

    #[test]
    fn test_execution_order_respects_edges() {
        let graph = vm_graph();
        let order: Vec<String> = graph
            .execution_order()
            .unwrap()
            .into_iter()
            .map(|r| r.key())
            .collect();

        let pos = |key: &str| order.iter().position(|k| k == key).unwrap();
        assert!(pos("group:rg") < pos("vnet:net"));
        assert!(pos("nsg:fw") < pos("subnet:sub"));
        assert!(pos("ip:pip") < pos("nic:nic"));
        assert!(pos("nic:nic") < pos("vm:vm"));
    }

    #[test]
    fn test_duplicate_resource() {
        let mut graph = ResourceGraph::new();
        graph.add(resource("group", "rg", &[])).unwrap();
        let result = graph.add(resource("group", "rg", &[]));
        assert!(matches!(result, Err(CloudError::DuplicateResource(_))));
    }

    #[test]
    fn test_dangling_reference() {
        let mut graph = ResourceGraph::new();
        graph.add(resource("vnet", "net", &["group:missing"])).unwrap();
        assert!(matches!(
            graph.waves(),
            Err(CloudError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn test_cycle_detected() {
        let mut graph = ResourceGraph::new();
        graph.add(resource("a", "1", &["b:2"])).unwrap();
        graph.add(resource("b", "2", &["a:1"])).unwrap();
        graph.add(resource("c", "3", &[])).unwrap();

        match graph.execution_order() {
            Err(CloudError::DependencyCycle(message)) => {
                assert!(message.contains("a:1"));
                assert!(message.contains("b:2"));
            }
            other => panic!("Expected DependencyCycle, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_explicit_depends_on() {
        let mut graph = ResourceGraph::new();
        graph.add(resource("a", "1", &[])).unwrap();
        graph
            .add(
                resource("b", "2", &[])
                    .with_options(ResourceOptions::default().depends_on("a:1")),
            )
            .unwrap();

        let waves = graph.waves().unwrap();
        assert_eq!(waves.len(), 2);
        assert_eq!(keys(&waves[1]), vec!["b:2"]);
    }

    #[test]
    fn test_dependents_are_transitive() {
        let graph = vm_graph();
        let mut dependents = graph.dependents("nsg:fw").unwrap();
        dependents.sort();
        assert_eq!(dependents, vec!["nic:nic", "subnet:sub", "vm:vm"]);
        assert!(graph.dependents("vm:vm").unwrap().is_empty());
    }

    #[test]
    fn test_from_state_drops_missing_dependencies() {
        let mut state = GlobalState::new();
        state.set_resource(
            "vnet:net".to_string(),
            ResourceState::new("id-net", "vnet").with_dependencies(vec!["group:rg".to_string()]),
        );
        state.set_resource(
            "subnet:sub".to_string(),
            ResourceState::new("id-sub", "subnet").with_dependencies(vec!["vnet:net".to_string()]),
        );

        let graph = ResourceGraph::from_state(&state);
        let waves = graph.waves().unwrap();
        assert_eq!(keys(&waves[0]), vec!["vnet:net"]);
        assert_eq!(keys(&waves[1]), vec!["subnet:sub"]);
    }
}
