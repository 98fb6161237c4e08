//! Core types for toolstream.

pub mod invocation;
pub mod message;
pub mod stream;
pub mod usage;

pub use invocation::*;
pub use message::*;
pub use stream::*;
pub use usage::*;
