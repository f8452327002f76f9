//! Type definitions for warden storage.

mod ids;
mod members;
mod overrides;
mod resources;
mod roles;

// Re-export all types from submodules
pub use ids::*;
pub use members::*;
pub use overrides::*;
pub use resources::*;
pub use roles::*;
