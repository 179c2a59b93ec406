// file: src/steps.rs
// version: 2.0.0
// guid: h8i9j0k1-l2m3-4567-8901-bcdef234567

//! Step results reported by the orchestrator

use serde::Serialize;
use std::fmt;

/// How a baseline step ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum StepOutcome {
    /// The step changed the host
    Applied,

    /// The host already matched the baseline
    Unchanged,

    /// The step did not apply to this host or run
    Skipped(String),

    /// The step failed in a tolerated way; the host is left short of baseline
    Degraded(String),
}

impl StepOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded(reason.into())
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    /// Combine two outcomes of the same step, keeping the more significant one
    pub fn merge(self, other: StepOutcome) -> StepOutcome {
        use StepOutcome::*;
        match (self, other) {
            (Degraded(a), _) => Degraded(a),
            (_, Degraded(b)) => Degraded(b),
            (Applied, _) | (_, Applied) => Applied,
            (Unchanged, _) | (_, Unchanged) => Unchanged,
            (Skipped(a), Skipped(_)) => Skipped(a),
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Applied => write!(f, "applied"),
            StepOutcome::Unchanged => write!(f, "unchanged"),
            StepOutcome::Skipped(reason) => write!(f, "skipped ({})", reason),
            StepOutcome::Degraded(reason) => write!(f, "degraded ({})", reason),
        }
    }
}

/// Named outcome of one orchestrated step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub outcome: StepOutcome,
}

impl StepReport {
    pub fn new(name: impl Into<String>, outcome: StepOutcome) -> Self {
        Self {
            name: name.into(),
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_degraded_then_applied() {
        let merged = StepOutcome::Applied.merge(StepOutcome::degraded("restart failed"));
        assert_eq!(merged, StepOutcome::Degraded("restart failed".to_string()));

        let merged = StepOutcome::Unchanged.merge(StepOutcome::Applied);
        assert_eq!(merged, StepOutcome::Applied);

        let merged = StepOutcome::skipped("n/a").merge(StepOutcome::Unchanged);
        assert_eq!(merged, StepOutcome::Unchanged);
    }

    #[test]
    fn test_display() {
        assert_eq!(StepOutcome::skipped("dry run").to_string(), "skipped (dry run)");
        assert!(StepOutcome::degraded("x").is_degraded());
    }
}
