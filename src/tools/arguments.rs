//! Typed access to a tool call's JSON arguments.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ToolStreamError;

/// Arguments of a tool call in `call` state.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    raw: Value,
}

impl ToolArguments {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    pub fn get_str(&self, key: &str) -> Result<&str, ToolStreamError> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| wrong_type(key, "a string"))
    }

    pub fn get_opt_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, ToolStreamError> {
        self.require(key)?
            .as_i64()
            .ok_or_else(|| wrong_type(key, "an integer"))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, ToolStreamError> {
        self.require(key)?
            .as_f64()
            .ok_or_else(|| wrong_type(key, "a number"))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ToolStreamError> {
        self.require(key)?
            .as_bool()
            .ok_or_else(|| wrong_type(key, "a boolean"))
    }

    /// Deserialize the whole argument object into `T`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ToolStreamError> {
        serde_json::from_value(self.raw.clone())
            .map_err(|err| ToolStreamError::InvalidArgument(err.to_string()))
    }

    fn require(&self, key: &str) -> Result<&Value, ToolStreamError> {
        self.get(key)
            .ok_or_else(|| ToolStreamError::InvalidArgument(format!("missing argument '{key}'")))
    }
}

impl From<Value> for ToolArguments {
    fn from(raw: Value) -> Self {
        Self::new(raw)
    }
}

fn wrong_type(key: &str, expected: &str) -> ToolStreamError {
    ToolStreamError::InvalidArgument(format!("argument '{key}' is not {expected}"))
}
