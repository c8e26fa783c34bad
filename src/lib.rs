//! roadmap: self-expanding knowledge roadmaps
//!
//! A roadmap is a tree of concepts grown on demand. Expanding a node asks a
//! content generator for its subtopics; exploring a node asks for an
//! explanation. Both results are cached on the node, so each is generated
//! at most once.
//!
//! Layers, innermost first: `domain` (entities, state machines, layout,
//! arena tree), `application` (the roadmap service), `infrastructure`
//! (repository, snapshots, generators, DI) and `cli`.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
