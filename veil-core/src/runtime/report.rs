//! Per-run outcome records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hooks::TargetKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookOutcome {
    Applied,
    CompileFailed,
    Threw,
}

impl HookOutcome {
    pub fn is_failure(self) -> bool {
        !matches!(self, HookOutcome::Applied)
    }
}

impl std::fmt::Display for HookOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HookOutcome::Applied => "applied",
            HookOutcome::CompileFailed => "compile_failed",
            HookOutcome::Threw => "threw",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookReport {
    pub codename: String,
    pub outcome: HookOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub elapsed_ms: f64,
}

/// Everything one `ExecutionContext::run` did, in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub trace_id: String,
    pub target: TargetKind,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<HookReport>,
}

impl RunReport {
    pub fn applied(&self) -> impl Iterator<Item = &HookReport> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == HookOutcome::Applied)
    }

    pub fn failures(&self) -> impl Iterator<Item = &HookReport> {
        self.outcomes.iter().filter(|o| o.outcome.is_failure())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn outcome(&self, codename: &str) -> Option<HookOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.codename == codename)
            .map(|o| o.outcome)
    }
}
