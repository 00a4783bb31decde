//! # Risk Engine - Weighted Risk Scoring for Actions
//!
//! The Risk Engine classifies an action context into LOW/MEDIUM/HIGH bands
//! using a weighted sum over five factors: the action token, the target
//! surface, reversibility, data sensitivity and urgency. The resulting band
//! gates agent spawns and every side-effecting operation in the kernel.

use crate::types::*;
use std::collections::HashMap;
use tracing::debug;

/// Factor weights applied to the five scoring dimensions
///
/// The split mirrors how much each dimension historically predicted incident
/// severity: what is being done and where dominate, with reversibility,
/// sensitivity and urgency as modifiers.
#[derive(Debug, Clone)]
pub struct FactorWeights {
    pub action: f64,
    pub target: f64,
    pub reversibility: f64,
    pub sensitivity: f64,
    pub urgency: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            action: 0.30,
            target: 0.25,
            reversibility: 0.20,
            sensitivity: 0.15,
            urgency: 0.10,
        }
    }
}

/// Risk engine producing banded assessments for action contexts
pub struct RiskEngine {
    weights: FactorWeights,
    action_weights: HashMap<&'static str, f64>,
    target_weights: HashMap<&'static str, f64>,
}

impl RiskEngine {
    /// Create an engine with the built-in action and target weight tables
    pub fn new() -> Self {
        let action_weights: HashMap<&'static str, f64> = [
            ("read", 0.1),
            ("search", 0.1),
            ("format", 0.2),
            ("create", 0.5),
            ("edit", 0.5),
            ("write", 0.6),
            ("execute", 0.7),
            ("install", 0.7),
            ("delete", 0.8),
            ("deploy", 0.9),
            ("system", 0.9),
            ("secrets", 1.0),
        ]
        .into_iter()
        .collect();

        let target_weights: HashMap<&'static str, f64> = [
            ("sandbox", 0.1),
            ("workspace", 0.3),
            ("memory", 0.5),
            ("config", 0.6),
            ("system", 0.9),
            ("production", 1.0),
        ]
        .into_iter()
        .collect();

        Self {
            weights: FactorWeights::default(),
            action_weights,
            target_weights,
        }
    }

    /// Assess an action context and produce a banded verdict
    ///
    /// Unknown actions and targets score 0.5. Scores below 0.3 are LOW and
    /// auto-approved; scores in `[0.3, 0.7)` are MEDIUM and rule-approved;
    /// scores at or above 0.7 are HIGH and require a human decision.
    pub fn assess(&self, ctx: &ActionContext) -> RiskAssessment {
        let action_w = self.action_weight(&ctx.action);
        let target_w = self.target_weight(&ctx.target);
        let reversibility_w = if ctx.reversible { 0.2 } else { 0.9 };
        let sensitivity_w = if ctx.sensitive_data { 0.9 } else { 0.1 };
        let urgency_w = if ctx.urgent { 0.7 } else { 0.3 };

        let contributions = [
            (
                format!("action={}", ctx.action),
                action_w,
                self.weights.action * action_w,
            ),
            (
                format!("target={}", ctx.target),
                target_w,
                self.weights.target * target_w,
            ),
            (
                "reversibility".to_string(),
                reversibility_w,
                self.weights.reversibility * reversibility_w,
            ),
            (
                "sensitivity".to_string(),
                sensitivity_w,
                self.weights.sensitivity * sensitivity_w,
            ),
            (
                "urgency".to_string(),
                urgency_w,
                self.weights.urgency * urgency_w,
            ),
        ];

        let score: f64 = contributions.iter().map(|(_, _, c)| c).sum();
        let risk = Self::band(score);

        let assessment = RiskAssessment {
            risk,
            score,
            approved: risk != RiskLevel::High,
            requires_human_approval: risk == RiskLevel::High,
            reason: Self::trace_reason(&contributions),
        };

        debug!(
            action = %ctx.action,
            target = %ctx.target,
            score = format!("{:.2}", score).as_str(),
            risk = %risk,
            "risk assessed"
        );

        assessment
    }

    fn band(score: f64) -> RiskLevel {
        if score < 0.3 {
            RiskLevel::Low
        } else if score < 0.7 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    fn action_weight(&self, action: &str) -> f64 {
        self.action_weights.get(action).copied().unwrap_or(0.5)
    }

    fn target_weight(&self, target: &str) -> f64 {
        self.target_weights.get(target).copied().unwrap_or(0.5)
    }

    /// Build the terse two-factor trace used as the assessment reason
    fn trace_reason(contributions: &[(String, f64, f64)]) -> String {
        let mut ranked: Vec<&(String, f64, f64)> = contributions.iter().collect();
        ranked.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));

        ranked
            .iter()
            .take(2)
            .map(|(label, weight, _)| format!("{}({:.2})", label, weight))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for RiskEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_workspace_is_low() {
        let engine = RiskEngine::new();
        let verdict = engine.assess(&ActionContext::new("read", "workspace"));

        assert_eq!(verdict.risk, RiskLevel::Low);
        assert!(verdict.approved);
        assert!(!verdict.requires_human_approval);
    }

    #[test]
    fn test_irreversible_production_deploy_is_high() {
        let engine = RiskEngine::new();
        let verdict = engine.assess(&ActionContext::new("deploy", "production").irreversible());

        assert_eq!(verdict.risk, RiskLevel::High);
        assert!(!verdict.approved);
        assert!(verdict.requires_human_approval);
        assert!(verdict.reason.contains("action=deploy"));
        assert!(verdict.reason.contains("target=production"));
    }

    #[test]
    fn test_irreversible_config_write_is_medium() {
        let engine = RiskEngine::new();
        let verdict = engine.assess(&ActionContext::new("write", "config").irreversible());

        assert_eq!(verdict.risk, RiskLevel::Medium);
        assert!(verdict.approved);
        assert!(!verdict.requires_human_approval);
    }

    #[test]
    fn test_unknown_tokens_default_to_midpoint() {
        let engine = RiskEngine::new();
        let known = engine.assess(&ActionContext::new("read", "workspace"));
        let unknown = engine.assess(&ActionContext::new("mystery", "elsewhere"));

        assert!(unknown.score > known.score);
        // 0.30*0.5 + 0.25*0.5 + 0.20*0.2 + 0.15*0.1 + 0.10*0.3
        assert!((unknown.score - 0.36).abs() < 1e-9);
    }

    #[test]
    fn test_score_bands_are_contiguous() {
        assert_eq!(RiskEngine::band(0.0), RiskLevel::Low);
        assert_eq!(RiskEngine::band(0.3), RiskLevel::Medium);
        assert_eq!(RiskEngine::band(0.69), RiskLevel::Medium);
        assert_eq!(RiskEngine::band(0.7), RiskLevel::High);
    }
}
