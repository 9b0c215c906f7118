//! Adaptive practice scheduler: decides which questions a learner sees
//! next, sourced from tiered pools with cross-session dedup.

pub mod concept;
pub mod config;
pub mod engine;
pub mod fingerprint;
pub mod mastery;
pub mod sourcing;
pub mod targets;
pub mod types;
pub mod variant;
