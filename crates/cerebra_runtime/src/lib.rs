//! Cerebra Runtime
//!
//! Runs compiled command lines as subprocesses and drives each invocation
//! through its lifecycle: validate, compile, execute, resolve.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod executor;
pub mod job;

pub use executor::{Executor, ExecutorConfig};
pub use job::{Job, Stage};
