//! # Role Registry - The Twenty Agent Roles
//!
//! The registry defines the fixed set of roles a node may be scheduled as:
//! five pure LLM roles, eight hybrid roles and seven tool roles. Tool roles
//! run outside the token budget and always declare zero average tokens.

use crate::types::{NodeType, Role, SwarmError, SwarmResult};
use std::collections::HashMap;

/// Registry of the built-in agent roles
pub struct RoleRegistry {
    roles: HashMap<String, Role>,
}

impl RoleRegistry {
    /// Build the registry with the full built-in role set
    pub fn new() -> Self {
        let mut roles = HashMap::new();

        let builtin = [
            // LLM roles: pure reasoning, highest token appetite
            ("planner", NodeType::Llm, "Decompose the task into an ordered plan", 1800, "skip when the task is a single trivial step"),
            ("architect", NodeType::Llm, "Shape module boundaries and interfaces", 2000, "skip when no new components are introduced"),
            ("reviewer", NodeType::Llm, "Review changes for correctness and style", 1500, "skip when the change is generated boilerplate"),
            ("critic", NodeType::Llm, "Challenge the chosen approach before execution", 1200, "skip when the plan has a single viable option"),
            ("summarizer", NodeType::Llm, "Condense intermediate results for downstream agents", 900, "skip when the context is already below budget"),
            // Hybrid roles: reasoning plus tool invocations
            ("coder", NodeType::Hybrid, "Implement the change described by the node", 1500, "skip when no files need modification"),
            ("researcher", NodeType::Hybrid, "Gather facts from the codebase and memory", 1100, "skip when the context already answers the question"),
            ("debugger", NodeType::Hybrid, "Reproduce and isolate a reported failure", 1400, "skip when no failure is reported"),
            ("refactorer", NodeType::Hybrid, "Restructure code without changing behaviour", 1300, "skip when the touched code is already idiomatic"),
            ("integrator", NodeType::Hybrid, "Merge agent outputs into a consistent change", 1000, "skip when only one agent produced output"),
            ("analyst", NodeType::Hybrid, "Quantify impact and surface trade-offs", 900, "skip when the decision is already made"),
            ("documenter", NodeType::Hybrid, "Write docs for the produced change", 800, "skip when docs are explicitly out of scope"),
            ("optimizer", NodeType::Hybrid, "Tune hot paths flagged by measurements", 1200, "skip when no measurement flags a hot path"),
            // Tool roles: deterministic, budget-exempt
            ("tester", NodeType::Tool, "Run the verification command", 0, "skip when no verify command is given"),
            ("linter", NodeType::Tool, "Run static checks over changed files", 0, "skip when no source files changed"),
            ("formatter", NodeType::Tool, "Apply canonical formatting", 0, "skip when formatting is already clean"),
            ("builder", NodeType::Tool, "Compile the workspace", 0, "skip when no compiled artifact is required"),
            ("scanner", NodeType::Tool, "Scan for secrets and denied paths", 0, "skip when no new files were written"),
            ("packager", NodeType::Tool, "Assemble the release artifact", 0, "skip when the task does not ship an artifact"),
            ("deployer", NodeType::Tool, "Push the artifact to its target", 0, "skip when the task stops before deployment"),
        ];

        for (name, category, description, avg_tokens, skip_condition) in builtin {
            roles.insert(
                name.to_string(),
                Role {
                    name: name.to_string(),
                    category,
                    description: description.to_string(),
                    avg_tokens,
                    skip_condition: skip_condition.to_string(),
                },
            );
        }

        Self { roles }
    }

    pub fn get(&self, name: &str) -> SwarmResult<&Role> {
        self.roles
            .get(name)
            .ok_or_else(|| SwarmError::RoleNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.roles.contains_key(name)
    }

    pub fn by_category(&self, category: NodeType) -> Vec<&Role> {
        let mut matching: Vec<&Role> = self
            .roles
            .values()
            .filter(|r| r.category == category)
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        matching
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.roles.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for RoleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
