//! Type definitions for Tandem.
//!
//! Identifiers shared between the lock manager and its collaborators.

mod ids;
mod resource;

pub use ids::OwnerId;
pub use resource::{Granularity, ResourceId};
