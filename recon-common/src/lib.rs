//! # Recon Common Library
//!
//! Shared code for the auto-reconnaissance binaries:
//! - Error type and result alias
//! - TOML configuration loading and resolution
//! - Domain model (entities, dispositions, task status)
//! - Lattice REST clients and wire types
//! - Typed mapping from wire entities onto the domain model
//! - Great-circle distance

pub mod client;
pub mod config;
pub mod error;
pub mod geo;
pub mod lattice;
pub mod model;

pub use error::{Error, Result};
pub use model::{Classification, Disposition, Entity, Position, Provenance, TaskId, TaskStatus};
