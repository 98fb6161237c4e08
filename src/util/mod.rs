//! Small async helpers.

pub mod timeout;

pub use timeout::{with_optional_timeout, with_timeout};
