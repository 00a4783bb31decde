//! # Task DAG - Bounded Dependency Graph of Task Nodes
//!
//! The DAG owns every node's status. Insertion is validated against four
//! rules: the node count stays below the configured maximum, the node's depth
//! stays strictly below the maximum, every dependency already exists, and the
//! edge set stays acyclic. A rejected insert leaves the graph unchanged.
//!
//! Collapse walks a node's transitive descendants and cancels the pending
//! ones; running and completed descendants are left untouched.

use crate::types::*;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, info};

/// Bounds applied at node insertion
#[derive(Debug, Clone)]
pub struct DagConfig {
    pub max_nodes: usize,
    pub max_depth: u32,
}

impl Default for DagConfig {
    fn default() -> Self {
        Self {
            max_nodes: 10,
            max_depth: 3,
        }
    }
}

/// Directed acyclic graph of task nodes
pub struct TaskDag {
    config: DagConfig,
    nodes: HashMap<String, TaskNode>,
    /// Insertion order, for deterministic iteration
    order: Vec<String>,
}

impl TaskDag {
    pub fn new(config: DagConfig) -> Self {
        Self {
            config,
            nodes: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Validate and insert a node; on any violation the graph is unchanged
    pub fn add_node(&mut self, node: TaskNode) -> SwarmResult<()> {
        if self.nodes.len() >= self.config.max_nodes {
            return Err(SwarmError::NodeLimitExceeded(self.config.max_nodes));
        }

        if node.depth >= self.config.max_depth {
            return Err(SwarmError::DepthExceeded {
                depth: node.depth,
                max_depth: self.config.max_depth,
            });
        }

        if self.nodes.contains_key(&node.id) {
            return Err(SwarmError::DuplicateNode(node.id));
        }

        for dep in &node.dependencies {
            if !self.nodes.contains_key(dep) {
                return Err(SwarmError::DependencyMissing(dep.clone()));
            }
        }

        if self.would_create_cycle(&node) {
            return Err(SwarmError::CycleDetected(node.id));
        }

        debug!(id = %node.id, role = %node.role, deps = node.dependencies.len(), "node added");
        self.order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// DFS from each dependency of the candidate looking for a path back to it
    fn would_create_cycle(&self, candidate: &TaskNode) -> bool {
        let mut stack: Vec<&str> = candidate.dependencies.iter().map(String::as_str).collect();
        let mut visited: HashSet<&str> = HashSet::new();

        while let Some(current) = stack.pop() {
            if current == candidate.id {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.dependencies.iter().map(String::as_str));
            }
        }

        false
    }

    /// Pending nodes whose dependencies are all done
    pub fn get_ready(&self) -> Vec<TaskNode> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| {
                node.status == NodeStatus::Pending
                    && node.dependencies.iter().all(|dep| {
                        self.nodes
                            .get(dep)
                            .map(|d| d.status == NodeStatus::Done)
                            .unwrap_or(false)
                    })
            })
            .cloned()
            .collect()
    }

    /// Mutate the status fields of one node
    pub fn set_status(
        &mut self,
        id: &str,
        status: NodeStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> SwarmResult<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| SwarmError::NodeNotFound(id.to_string()))?;

        node.status = status;
        if result.is_some() {
            node.result = result;
        }
        if error.is_some() {
            node.error = error;
        }
        Ok(())
    }

    /// Record a failed attempt
    ///
    /// Returns `true` when the node reverted to pending for another attempt,
    /// `false` when retries are exhausted and the node is finally failed.
    pub fn record_failure(&mut self, id: &str, error: &str) -> SwarmResult<bool> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| SwarmError::NodeNotFound(id.to_string()))?;

        if node.retries < node.max_retries {
            node.retries += 1;
            node.status = NodeStatus::Pending;
            debug!(id, retry = node.retries, "node reverted to pending for retry");
            Ok(true)
        } else {
            node.status = NodeStatus::Failed;
            node.error = Some(error.to_string());
            info!(id, error, "node failed after exhausting retries");
            Ok(false)
        }
    }

    /// Cancel the pending transitive descendants of `id`
    ///
    /// Running and completed descendants are untouched. Returns the ids that
    /// were cancelled.
    pub fn collapse(&mut self, id: &str) -> Vec<String> {
        let mut descendants = Vec::new();
        let mut queue: VecDeque<String> = VecDeque::from([id.to_string()]);
        let mut seen: HashSet<String> = HashSet::from([id.to_string()]);

        while let Some(current) = queue.pop_front() {
            for (node_id, node) in &self.nodes {
                if node.dependencies.contains(&current) && seen.insert(node_id.clone()) {
                    descendants.push(node_id.clone());
                    queue.push_back(node_id.clone());
                }
            }
        }

        let mut cancelled = Vec::new();
        for node_id in descendants {
            if let Some(node) = self.nodes.get_mut(&node_id) {
                if node.status == NodeStatus::Pending {
                    node.status = NodeStatus::Cancelled;
                    cancelled.push(node_id);
                }
            }
        }

        if !cancelled.is_empty() {
            info!(root = id, cancelled = cancelled.len(), "collapsed pending descendants");
        }
        cancelled
    }

    /// Dependency-respecting order over every node (Kahn's algorithm)
    pub fn topological_sort(&self) -> Vec<String> {
        let mut in_degree: HashMap<&str, usize> = self
            .nodes
            .values()
            .map(|n| (n.id.as_str(), n.dependencies.len()))
            .collect();

        let mut queue: VecDeque<&str> = self
            .order
            .iter()
            .map(String::as_str)
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();

        let mut sorted = Vec::with_capacity(self.nodes.len());
        while let Some(current) = queue.pop_front() {
            sorted.push(current.to_string());
            for id in &self.order {
                let node = &self.nodes[id];
                if node.dependencies.iter().any(|d| d == current) {
                    if let Some(degree) = in_degree.get_mut(id.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(id);
                        }
                    }
                }
            }
        }

        sorted
    }

    /// Whether every node reached a terminal status
    pub fn is_complete(&self) -> bool {
        self.nodes.values().all(|n| n.status.is_terminal())
    }

    pub fn get(&self, id: &str) -> Option<&TaskNode> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> Vec<&TaskNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id)).collect()
    }

    pub fn count_by_status(&self, status: NodeStatus) -> usize {
        self.nodes.values().filter(|n| n.status == status).count()
    }
}

impl Default for TaskDag {
    fn default() -> Self {
        Self::new(DagConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, deps: &[&str]) -> TaskNode {
        TaskNode::new(id, "coder", NodeType::Hybrid, "work")
            .with_dependencies(deps.iter().map(|s| s.to_string()).collect())
            .with_budget(100)
    }

    #[test]
    fn test_add_and_ready() {
        let mut dag = TaskDag::default();
        dag.add_node(node("a", &[])).unwrap();
        dag.add_node(node("b", &["a"])).unwrap();

        let ready: Vec<String> = dag.get_ready().into_iter().map(|n| n.id).collect();
        assert_eq!(ready, vec!["a"]);

        dag.set_status("a", NodeStatus::Done, None, None).unwrap();
        let ready: Vec<String> = dag.get_ready().into_iter().map(|n| n.id).collect();
        assert_eq!(ready, vec!["b"]);
    }

    #[test]
    fn test_missing_dependency_rejected() {
        let mut dag = TaskDag::default();
        let err = dag.add_node(node("b", &["ghost"])).unwrap_err();
        assert!(matches!(err, SwarmError::DependencyMissing(_)));
        assert_eq!(dag.node_count(), 0);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut dag = TaskDag::default();
        dag.add_node(node("a", &[])).unwrap();
        assert!(matches!(
            dag.add_node(node("a", &[])),
            Err(SwarmError::DuplicateNode(_))
        ));
    }

    #[test]
    fn test_node_limit() {
        let mut dag = TaskDag::new(DagConfig {
            max_nodes: 2,
            max_depth: 3,
        });
        dag.add_node(node("a", &[])).unwrap();
        dag.add_node(node("b", &[])).unwrap();
        assert!(matches!(
            dag.add_node(node("c", &[])),
            Err(SwarmError::NodeLimitExceeded(2))
        ));
    }

    #[test]
    fn test_depth_bound_is_strict() {
        let mut dag = TaskDag::default();
        assert!(dag.add_node(node("ok", &[]).with_depth(2)).is_ok());
        assert!(matches!(
            dag.add_node(node("deep", &[]).with_depth(3)),
            Err(SwarmError::DepthExceeded { .. })
        ));
    }

    #[test]
    fn test_topological_sort_covers_every_node_once() {
        let mut dag = TaskDag::default();
        dag.add_node(node("a", &[])).unwrap();
        dag.add_node(node("b", &["a"])).unwrap();
        dag.add_node(node("c", &["a"])).unwrap();
        dag.add_node(node("d", &["b", "c"])).unwrap();

        let sorted = dag.topological_sort();
        assert_eq!(sorted.len(), 4);

        let position = |id: &str| sorted.iter().position(|s| s == id).unwrap();
        assert!(position("a") < position("b"));
        assert!(position("a") < position("c"));
        assert!(position("b") < position("d"));
        assert!(position("c") < position("d"));
    }

    #[test]
    fn test_collapse_cancels_only_pending_descendants() {
        let mut dag = TaskDag::default();
        dag.add_node(node("root", &[])).unwrap();
        dag.add_node(node("done", &["root"])).unwrap();
        dag.add_node(node("running", &["root"])).unwrap();
        dag.add_node(node("pending", &["root"])).unwrap();
        dag.add_node(node("grandchild", &["pending"])).unwrap();

        dag.set_status("done", NodeStatus::Done, None, None).unwrap();
        dag.set_status("running", NodeStatus::Running, None, None).unwrap();

        let mut cancelled = dag.collapse("root");
        cancelled.sort();
        assert_eq!(cancelled, vec!["grandchild", "pending"]);

        assert_eq!(dag.get("done").unwrap().status, NodeStatus::Done);
        assert_eq!(dag.get("running").unwrap().status, NodeStatus::Running);
        assert_eq!(dag.get("pending").unwrap().status, NodeStatus::Cancelled);
    }

    #[test]
    fn test_record_failure_retries_then_fails() {
        let mut dag = TaskDag::default();
        dag.add_node(node("n", &[]).with_max_retries(2)).unwrap();

        assert!(dag.record_failure("n", "boom").unwrap());
        assert!(dag.record_failure("n", "boom").unwrap());
        assert!(!dag.record_failure("n", "boom").unwrap());

        let node = dag.get("n").unwrap();
        assert_eq!(node.status, NodeStatus::Failed);
        assert_eq!(node.retries, 2);
        assert_eq!(node.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_is_complete() {
        let mut dag = TaskDag::default();
        dag.add_node(node("a", &[])).unwrap();
        dag.add_node(node("b", &[])).unwrap();
        assert!(!dag.is_complete());

        dag.set_status("a", NodeStatus::Done, None, None).unwrap();
        dag.set_status("b", NodeStatus::Cancelled, None, None).unwrap();
        assert!(dag.is_complete());
    }
}
