//! Tool registry, client-side handlers and argument validation.

pub mod arguments;
pub mod registry;
pub mod tool;
pub mod types;
pub mod validation;

pub use arguments::ToolArguments;
pub use registry::{ExecutionMode, RegisteredTool, ToolRegistry};
pub use tool::{FnTool, Tool, ToolExecutionContext};
pub use types::{ParameterBuilder, ToolParameters};
pub use validation::validate_arguments;
