//! Cerebra Tool Engine
//!
//! The generic machinery every wrapped tool plugs into: a declarative
//! parameter schema, a validator, an argument compiler, and an output
//! resolver. Tools contribute data (fields, constraints, output rules) and
//! occasionally a per-field renderer; they never re-implement the engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compile;
pub mod context;
pub mod invocation;
pub mod registry;
pub mod resolve;
pub mod schema;
pub mod trait_;
pub mod validate;

pub use compile::{compile, CommandLine, RenderCtx, Renderer};
pub use context::Context;
pub use invocation::Invocation;
pub use registry::{Registry, RegistryError};
pub use resolve::{resolve, verify, OutputPlan, OutputValue, Outputs, PathRule};
pub use schema::{
    Constraint, Field, FieldKind, Generator, NameTemplate, OutputDescriptor, ToolFamily,
    ToolSchema,
};
pub use trait_::{Interface, ProcessOutput};
pub use validate::{validate, Validator};
