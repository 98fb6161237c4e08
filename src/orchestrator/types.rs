//! Orchestrator settings and turn results.

use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use super::limits::{tool_timeout_from_env, StepBudget};
use crate::conversation::TurnStatus;
use crate::error::ToolStreamError;
use crate::types::{ToolInvocation, Usage};

/// Orchestrator settings.
#[derive(Debug, Clone, Builder)]
pub struct OrchestratorConfig {
    #[builder(default)]
    pub budget: StepBudget,
    /// Default bound on a client handler's run time.
    pub tool_timeout: Option<Duration>,
}

impl OrchestratorConfig {
    pub fn new(max_steps: u32) -> Result<Self, ToolStreamError> {
        Ok(Self {
            budget: StepBudget::new(max_steps)?,
            tool_timeout: None,
        })
    }

    /// Read `TOOLSTREAM_MAX_STEPS` and `TOOLSTREAM_TOOL_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        Self {
            budget: StepBudget::from_env(),
            tool_timeout: tool_timeout_from_env(),
        }
    }

    pub fn max_steps(&self) -> u32 {
        self.budget.max_steps()
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            budget: StepBudget::default(),
            tool_timeout: None,
        }
    }
}

/// Result of [`run`](super::StepOrchestrator::run) or a resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub status: TurnStatus,
    /// Generation requests issued in this turn so far.
    pub steps: u32,
    /// Usage summed over this turn's responses.
    pub usage: Usage,
    /// Calls awaiting confirmation when `status` is `AwaitingConfirmation`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<ToolInvocation>,
}

impl TurnOutcome {
    pub fn is_suspended(&self) -> bool {
        self.status == TurnStatus::AwaitingConfirmation
    }
}
