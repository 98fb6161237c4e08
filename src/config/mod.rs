//! Client configuration (layered: explicit > env > config file > defaults).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ToolStreamError;
use crate::orchestrator::{OrchestratorConfig, StepBudget};
use crate::protocol::Framing;
use crate::transport::HttpTransport;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/chat";
pub const DEFAULT_MAX_STEPS: u32 = 5;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const CONFIG_FILE_NAME: &str = "toolstream.toml";

const ENV_ENDPOINT: &str = "TOOLSTREAM_ENDPOINT";
const ENV_API_KEY: &str = "TOOLSTREAM_API_KEY";
const ENV_FRAMING: &str = "TOOLSTREAM_FRAMING";
const ENV_MAX_STEPS: &str = "TOOLSTREAM_MAX_STEPS";
const ENV_CONNECT_TIMEOUT: &str = "TOOLSTREAM_CONNECT_TIMEOUT_MS";
const ENV_IDLE_TIMEOUT: &str = "TOOLSTREAM_IDLE_TIMEOUT_MS";
const ENV_TOOL_TIMEOUT: &str = "TOOLSTREAM_TOOL_TIMEOUT_MS";

/// Resolved settings for talking to a chat route.
///
/// # Example
/// ```no_run
/// use toolstream::config::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .endpoint("http://localhost:3000/api/chat")
///     .max_steps(3)
///     .build();
/// config.validate()?;
/// let transport = config.http_transport()?;
/// # Ok::<(), toolstream::error::ToolStreamError>(())
/// ```
#[derive(Clone, PartialEq, Builder)]
pub struct ClientConfig {
    #[builder(into, default = DEFAULT_ENDPOINT.to_string())]
    pub endpoint: String,
    #[builder(into)]
    pub api_key: Option<String>,
    #[builder(default)]
    pub framing: Framing,
    #[builder(default = DEFAULT_MAX_STEPS)]
    pub max_steps: u32,
    #[builder(default = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,
    /// Longest silence tolerated between body chunks.
    pub idle_timeout_ms: Option<u64>,
    /// Default bound on client handler run time.
    pub tool_timeout_ms: Option<u64>,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| ".."))
            .field("framing", &self.framing)
            .field("max_steps", &self.max_steps)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("idle_timeout_ms", &self.idle_timeout_ms)
            .field("tool_timeout_ms", &self.tool_timeout_ms)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientConfig {
    /// Resolve defaults, then the config file, then the environment, then
    /// `overrides`.
    ///
    /// An explicit `path` must exist. Without one, `toolstream.toml` in the
    /// platform config directory is read if present. `.env` is loaded first
    /// when found.
    pub fn load(path: Option<&Path>, overrides: ConfigLayer) -> Result<Self, ToolStreamError> {
        let _ = dotenvy::dotenv();

        let file = match path {
            Some(path) => ConfigLayer::from_file(path)?,
            None => match Self::default_config_path().filter(|path| path.is_file()) {
                Some(path) => ConfigLayer::from_file(&path)?,
                None => ConfigLayer::default(),
            },
        };
        let env = ConfigLayer::from_env()?;

        let config = Self::from_layer(file.overlay(env).overlay(overrides));
        config.validate()?;
        debug!(endpoint = %config.endpoint, framing = %config.framing, max_steps = config.max_steps, "configuration resolved");
        Ok(config)
    }

    /// [`load`](Self::load) with no explicit file or overrides.
    pub fn from_env() -> Result<Self, ToolStreamError> {
        Self::load(None, ConfigLayer::default())
    }

    /// Defaults with every value set in `layer` applied on top.
    pub fn from_layer(layer: ConfigLayer) -> Self {
        let defaults = Self::default();
        Self {
            endpoint: layer.endpoint.unwrap_or(defaults.endpoint),
            api_key: layer.api_key.or(defaults.api_key),
            framing: layer.framing.unwrap_or(defaults.framing),
            max_steps: layer.max_steps.unwrap_or(defaults.max_steps),
            connect_timeout_ms: layer
                .connect_timeout_ms
                .unwrap_or(defaults.connect_timeout_ms),
            idle_timeout_ms: layer.idle_timeout_ms.or(defaults.idle_timeout_ms),
            tool_timeout_ms: layer.tool_timeout_ms.or(defaults.tool_timeout_ms),
        }
    }

    /// `<config dir>/toolstream.toml` for this platform.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "toolstream")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<(), ToolStreamError> {
        if self.endpoint.trim().is_empty() {
            return Err(ToolStreamError::Configuration(
                "endpoint must not be empty".into(),
            ));
        }
        if self.max_steps == 0 {
            return Err(ToolStreamError::Configuration(
                "max_steps must be at least 1".into(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ToolStreamError::Configuration(
                "connect_timeout_ms must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn orchestrator_config(&self) -> Result<OrchestratorConfig, ToolStreamError> {
        Ok(OrchestratorConfig::builder()
            .budget(StepBudget::new(self.max_steps)?)
            .maybe_tool_timeout(self.tool_timeout_ms.map(Duration::from_millis))
            .build())
    }

    pub fn http_transport(&self) -> Result<HttpTransport, ToolStreamError> {
        let mut transport = HttpTransport::with_connect_timeout(
            &self.endpoint,
            Duration::from_millis(self.connect_timeout_ms),
        )?
        .with_framing(self.framing)
        .with_idle_timeout(self.idle_timeout_ms.map(Duration::from_millis));
        if let Some(api_key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            transport = transport.with_api_key(api_key)?;
        }
        Ok(transport)
    }
}

/// One source of settings; unset fields defer to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub framing: Option<Framing>,
    pub max_steps: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
    pub tool_timeout_ms: Option<u64>,
}

impl ConfigLayer {
    pub fn from_toml_str(raw: &str) -> Result<Self, ToolStreamError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ToolStreamError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ToolStreamError::Configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Read `TOOLSTREAM_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ToolStreamError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Read `TOOLSTREAM_*` variables through `lookup`. Blank values count as
    /// unset; malformed numbers or framings are rejected.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ToolStreamError> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        Ok(Self {
            endpoint: var(ENV_ENDPOINT),
            api_key: var(ENV_API_KEY),
            framing: var(ENV_FRAMING)
                .map(|value| {
                    value.parse::<Framing>().map_err(|_| {
                        ToolStreamError::Configuration(format!(
                            "{ENV_FRAMING} must be data-stream or sse, got {value:?}"
                        ))
                    })
                })
                .transpose()?,
            max_steps: parse_number(ENV_MAX_STEPS, var(ENV_MAX_STEPS))?,
            connect_timeout_ms: parse_number(ENV_CONNECT_TIMEOUT, var(ENV_CONNECT_TIMEOUT))?,
            idle_timeout_ms: parse_number(ENV_IDLE_TIMEOUT, var(ENV_IDLE_TIMEOUT))?,
            tool_timeout_ms: parse_number(ENV_TOOL_TIMEOUT, var(ENV_TOOL_TIMEOUT))?,
        })
    }

    /// Values set in `other` win.
    pub fn overlay(self, other: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            endpoint: other.endpoint.or(self.endpoint),
            api_key: other.api_key.or(self.api_key),
            framing: other.framing.or(self.framing),
            max_steps: other.max_steps.or(self.max_steps),
            connect_timeout_ms: other.connect_timeout_ms.or(self.connect_timeout_ms),
            idle_timeout_ms: other.idle_timeout_ms.or(self.idle_timeout_ms),
            tool_timeout_ms: other.tool_timeout_ms.or(self.tool_timeout_ms),
        }
    }
}

fn parse_number<T: std::str::FromStr>(
    name: &str,
    value: Option<String>,
) -> Result<Option<T>, ToolStreamError> {
    value
        .map(|value| {
            value.parse::<T>().map_err(|_| {
                ToolStreamError::Configuration(format!("{name} must be a number, got {value:?}"))
            })
        })
        .transpose()
}
