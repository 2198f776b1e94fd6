//! Cerebra FSL Interfaces
//!
//! Wrappers for FSL brain extraction, tissue segmentation, and linear and
//! non-linear registration. Generated output names follow the FSL output
//! type configured in the context (`FSLOUTPUTTYPE`), and the same type is
//! exported to the process so the tools write matching extensions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bet;
pub mod fast;
pub mod flirt;
pub mod fnirt;
pub mod mcflirt;
pub mod output_type;

// Re-exports
pub use bet::Bet;
pub use fast::Fast;
pub use flirt::{ApplyXfm, Flirt};
pub use fnirt::{ApplyWarp, Fnirt};
pub use mcflirt::McFlirt;
pub use output_type::{OutputType, OutputTypeError};

use cerebra_tool::{Registry, RegistryError};
use std::sync::Arc;

/// Register every FSL interface
///
/// # Errors
///
/// Returns error if an interface with the same name is already registered
pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(Arc::new(Bet::new()))?;
    registry.register(Arc::new(Fast::new()))?;
    registry.register(Arc::new(Flirt::new()))?;
    registry.register(Arc::new(ApplyXfm::new()))?;
    registry.register(Arc::new(McFlirt::new()))?;
    registry.register(Arc::new(Fnirt::new()))?;
    registry.register(Arc::new(ApplyWarp::new()))?;
    Ok(())
}
