//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (RoadmapRepository, ContentGenerator)
//! but are themselves concrete structs, not traits.

mod roadmap;

pub use roadmap::{
    DeleteOutcome, ExpandOutcome, ExploreOutcome, RoadmapCheck, RoadmapService, RoadmapView,
    ServiceOptions,
};
