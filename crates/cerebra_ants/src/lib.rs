//! Cerebra ANTs Interfaces
//!
//! Wrappers for the segmentation and cortical thickness tools of the
//! Advanced Normalization Tools suite. Each wrapper owns a static schema and
//! implements [`Interface`](cerebra_tool::Interface); [`register`] adds all
//! of them to a registry.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod atropos;
pub mod brain_extraction;
mod common;
pub mod cortical_thickness;
pub mod denoise;
pub mod joint_fusion;
pub mod kelly_kapowski;
pub mod laplacian_thickness;
pub mod n4;

// Re-exports
pub use atropos::Atropos;
pub use brain_extraction::BrainExtraction;
pub use cortical_thickness::CorticalThickness;
pub use denoise::DenoiseImage;
pub use joint_fusion::JointFusion;
pub use kelly_kapowski::KellyKapowski;
pub use laplacian_thickness::LaplacianThickness;
pub use n4::N4BiasFieldCorrection;

use cerebra_tool::{Registry, RegistryError};
use std::sync::Arc;

/// Register every ANTs interface
///
/// # Errors
///
/// Returns error if an interface with the same name is already registered
pub fn register(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register(Arc::new(Atropos::new()))?;
    registry.register(Arc::new(LaplacianThickness::new()))?;
    registry.register(Arc::new(N4BiasFieldCorrection::new()))?;
    registry.register(Arc::new(CorticalThickness::new()))?;
    registry.register(Arc::new(BrainExtraction::new()))?;
    registry.register(Arc::new(DenoiseImage::new()))?;
    registry.register(Arc::new(JointFusion::new()))?;
    registry.register(Arc::new(KellyKapowski::new()))?;
    Ok(())
}
