//! Personality system - named profile folders swapped in and out of a live workspace.
//!
//! The store holds one folder per personality, the ledger records which one is
//! live, and the engine keeps the workspace in line with the ledger across
//! restarts. Backups are taken before anything in the workspace or store is
//! overwritten or removed.

pub mod backup;
pub mod engine;
pub mod ledger;
pub mod registry;
pub mod store;
pub mod types;

pub use backup::RetentionPolicy;
pub use engine::SwitchEngine;
pub use types::{CreateSource, PersonalityName};
