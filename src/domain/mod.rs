//! Domain layer: entities, state machines and pure tree logic
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod entities;
pub mod error;
pub mod fallback;
pub mod layout;
pub mod tree;

pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use layout::{LayoutEngine, Position};
pub use tree::{ConceptTree, InvariantViolation};
