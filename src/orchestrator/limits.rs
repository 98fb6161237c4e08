use std::time::Duration;

use crate::error::ToolStreamError;

pub(super) const DEFAULT_MAX_STEPS: u32 = 5;
const MAX_STEPS_ENV: &str = "TOOLSTREAM_MAX_STEPS";
const TOOL_TIMEOUT_ENV: &str = "TOOLSTREAM_TOOL_TIMEOUT_MS";

/// How many generation requests one turn may issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBudget {
    max_steps: u32,
}

impl StepBudget {
    /// `max_steps` must be at least 1.
    pub fn new(max_steps: u32) -> Result<Self, ToolStreamError> {
        if max_steps == 0 {
            return Err(ToolStreamError::Configuration(
                "max_steps must be at least 1".into(),
            ));
        }
        Ok(Self { max_steps })
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    /// Whether a request for `step + 1` still fits.
    pub fn allows_continuation(&self, step: u32) -> bool {
        step.saturating_add(1) < self.max_steps
    }

    /// Budget from `TOOLSTREAM_MAX_STEPS`, falling back to the default on
    /// absent, zero or unparseable values.
    pub fn from_env() -> Self {
        let max_steps = std::env::var(MAX_STEPS_ENV)
            .ok()
            .and_then(|value| parse_positive(&value))
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(DEFAULT_MAX_STEPS);
        Self { max_steps }
    }
}

impl Default for StepBudget {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// Default handler timeout from `TOOLSTREAM_TOOL_TIMEOUT_MS`.
pub(super) fn tool_timeout_from_env() -> Option<Duration> {
    std::env::var(TOOL_TIMEOUT_ENV)
        .ok()
        .and_then(|value| parse_positive(&value))
        .map(Duration::from_millis)
}

pub(crate) fn parse_positive(value: &str) -> Option<u64> {
    match value.trim().parse::<u64>() {
        Ok(0) | Err(_) => None,
        Ok(parsed) => Some(parsed),
    }
}
