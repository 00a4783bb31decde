//! # Contract Checker - Pre-Output Invariant Gate
//!
//! Evaluates a set of registered contracts against a change (changed files +
//! diff) before an agent's result may be committed or surfaced. Any failing
//! contract blocks the output; callers receive the full violation list.
//!
//! Three contracts are built in:
//!
//! - **naming-conventions**: changed source files must use kebab-case names
//! - **no-env-access**: the change must not touch `.env` files or read
//!   environment variables directly
//! - **api-signature**: removing a public export line from an `index.*` file
//!   is a breaking change

use crate::types::*;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A single invariant evaluated against a change
#[async_trait]
pub trait ContractCheck: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self, input: &ContractInput) -> ContractOutcome;
}

static KEBAB_CASE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:[.-][a-z0-9]+)*$").expect("kebab-case pattern"));

/// Changed source files must carry kebab-case names
pub struct NamingConventionContract {
    extensions: Vec<String>,
}

impl NamingConventionContract {
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    fn applies_to(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }
}

impl Default for NamingConventionContract {
    fn default() -> Self {
        Self::new(vec!["ts".to_string(), "tsx".to_string()])
    }
}

#[async_trait]
impl ContractCheck for NamingConventionContract {
    fn name(&self) -> &str {
        "naming-conventions"
    }

    async fn check(&self, input: &ContractInput) -> ContractOutcome {
        let mut violations = Vec::new();

        for file in &input.changed_files {
            if !self.applies_to(file) {
                continue;
            }

            let stem = Path::new(file)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("");

            if !KEBAB_CASE.is_match(stem) {
                violations.push(format!("{file}: file name must be kebab-case"));
            }
        }

        ContractOutcome {
            contract: self.name().to_string(),
            passed: violations.is_empty(),
            violations,
        }
    }
}

/// Environment files and direct environment reads are off limits
pub struct NoEnvAccessContract {
    read_patterns: Vec<&'static str>,
}

impl Default for NoEnvAccessContract {
    fn default() -> Self {
        Self {
            read_patterns: vec!["process.env", "std::env::var"],
        }
    }
}

#[async_trait]
impl ContractCheck for NoEnvAccessContract {
    fn name(&self) -> &str {
        "no-env-access"
    }

    async fn check(&self, input: &ContractInput) -> ContractOutcome {
        let mut violations = Vec::new();

        for file in &input.changed_files {
            let name = Path::new(file)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("");
            if name.starts_with(".env") && name != ".env.example" {
                violations.push(format!("{file}: .env files must not be modified"));
            }
        }

        for pattern in &self.read_patterns {
            if input.diff.contains(pattern) {
                violations.push(format!(
                    "diff reads environment directly via `{pattern}`"
                ));
            }
        }

        ContractOutcome {
            contract: self.name().to_string(),
            passed: violations.is_empty(),
            violations,
        }
    }
}

/// Removed public exports from `index.*` files are breaking changes
#[derive(Default)]
pub struct ApiSignatureContract;

#[async_trait]
impl ContractCheck for ApiSignatureContract {
    fn name(&self) -> &str {
        "api-signature"
    }

    async fn check(&self, input: &ContractInput) -> ContractOutcome {
        let touches_index = input.changed_files.iter().any(|file| {
            Path::new(file)
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|stem| stem == "index")
                .unwrap_or(false)
        });

        let mut violations = Vec::new();
        if touches_index {
            for line in input.diff.lines() {
                let removed = line.strip_prefix('-').filter(|_| !line.starts_with("---"));
                if let Some(body) = removed {
                    if body.trim_start().starts_with("export ") {
                        violations.push(format!(
                            "breaking change: removed public export `{}`",
                            body.trim()
                        ));
                    }
                }
            }
        }

        ContractOutcome {
            contract: self.name().to_string(),
            passed: violations.is_empty(),
            violations,
        }
    }
}

/// Registry evaluating every contract against a change
pub struct ContractChecker {
    contracts: Vec<Arc<dyn ContractCheck>>,
}

impl ContractChecker {
    /// Checker preloaded with the three built-in contracts
    pub fn new() -> Self {
        Self {
            contracts: vec![
                Arc::new(NamingConventionContract::default()),
                Arc::new(NoEnvAccessContract::default()),
                Arc::new(ApiSignatureContract),
            ],
        }
    }

    /// Empty checker; callers register their own contracts
    pub fn empty() -> Self {
        Self {
            contracts: Vec::new(),
        }
    }

    pub fn register(&mut self, contract: Arc<dyn ContractCheck>) {
        debug!(contract = contract.name(), "contract registered");
        self.contracts.push(contract);
    }

    pub fn contract_names(&self) -> Vec<String> {
        self.contracts.iter().map(|c| c.name().to_string()).collect()
    }

    /// Evaluate every contract; `all_passed` is the logical AND
    pub async fn check_all(&self, input: &ContractInput) -> ContractReport {
        let mut results = Vec::with_capacity(self.contracts.len());

        for contract in &self.contracts {
            let outcome = contract.check(input).await;
            if !outcome.passed {
                info!(
                    contract = contract.name(),
                    violations = outcome.violations.len(),
                    "contract failed"
                );
            }
            results.push(outcome);
        }

        ContractReport {
            all_passed: results.iter().all(|r| r.passed),
            results,
        }
    }
}

impl Default for ContractChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_with_files(files: &[&str]) -> ContractInput {
        ContractInput {
            changed_files: files.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_kebab_case_names_pass() {
        let checker = ContractChecker::new();
        let report = checker
            .check_all(&input_with_files(&["src/task-runner.ts", "src/index.ts"]))
            .await;
        assert!(report.all_passed);
    }

    #[tokio::test]
    async fn test_pascal_case_name_blocks() {
        let checker = ContractChecker::new();
        let report = checker
            .check_all(&input_with_files(&["src/MyComponent.ts"]))
            .await;

        assert!(!report.all_passed);
        assert!(report
            .violations()
            .iter()
            .any(|v| v.contains("src/MyComponent.ts")));
    }

    #[tokio::test]
    async fn test_naming_ignores_other_extensions() {
        let checker = ContractChecker::new();
        let report = checker
            .check_all(&input_with_files(&["docs/ReadMe.md", "src/Build.rs"]))
            .await;
        assert!(report.all_passed);
    }

    #[tokio::test]
    async fn test_env_file_modification_blocks() {
        let checker = ContractChecker::new();
        let report = checker.check_all(&input_with_files(&["config/.env"])).await;
        assert!(!report.all_passed);
    }

    #[tokio::test]
    async fn test_env_example_is_exempt() {
        let checker = ContractChecker::new();
        let report = checker
            .check_all(&input_with_files(&["config/.env.example"]))
            .await;
        assert!(report.all_passed);
    }

    #[tokio::test]
    async fn test_direct_env_read_blocks() {
        let checker = ContractChecker::new();
        let mut input = input_with_files(&["src/config.ts"]);
        input.diff = "+const key = process.env.API_KEY;".to_string();

        let report = checker.check_all(&input).await;
        assert!(!report.all_passed);
    }

    #[tokio::test]
    async fn test_removed_index_export_blocks() {
        let checker = ContractChecker::new();
        let mut input = input_with_files(&["src/index.ts"]);
        input.diff = "-export function start() {}\n+function start() {}".to_string();

        let report = checker.check_all(&input).await;
        assert!(!report.all_passed);
        assert!(report.violations()[0].contains("breaking change"));
    }

    #[tokio::test]
    async fn test_removed_export_elsewhere_is_fine() {
        let checker = ContractChecker::new();
        let mut input = input_with_files(&["src/util.ts"]);
        input.diff = "-export function helper() {}".to_string();

        let report = checker.check_all(&input).await;
        assert!(report.all_passed);
    }

    #[tokio::test]
    async fn test_custom_contract_registration() {
        struct AlwaysFails;

        #[async_trait]
        impl ContractCheck for AlwaysFails {
            fn name(&self) -> &str {
                "always-fails"
            }

            async fn check(&self, _input: &ContractInput) -> ContractOutcome {
                ContractOutcome {
                    contract: self.name().to_string(),
                    passed: false,
                    violations: vec!["nope".to_string()],
                }
            }
        }

        let mut checker = ContractChecker::empty();
        checker.register(Arc::new(AlwaysFails));

        let report = checker.check_all(&ContractInput::default()).await;
        assert!(!report.all_passed);
        assert_eq!(checker.contract_names(), vec!["always-fails"]);
    }
}
