//! Core types, configuration, and error handling for orgpulse.
//!
//! This crate provides the shared foundation used by all other orgpulse crates:
//! - [`OrgpulseError`]: unified error type using `thiserror`
//! - [`OrgpulseConfig`]: configuration loaded from `.orgpulse.toml`
//! - Shared types: [`CommitRecord`], [`Role`], [`Label`], [`Granularity`],
//!   [`Weighting`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    ActivityConfig, Allowlists, ClassifyConfig, CutoffConfig, InputConfig, MiningConfig,
    OrgpulseConfig,
};
pub use error::OrgpulseError;
pub use types::{
    normalize_email, CommitRecord, Granularity, Label, OutputFormat, Role, Weighting,
};

/// A convenience `Result` type for orgpulse operations.
pub type Result<T> = std::result::Result<T, OrgpulseError>;
