//! Commit record sources.
//!
//! Turns raw version-control history into [`orgpulse_core::CommitRecord`]s,
//! either by parsing delimited `git log` text or by walking a local
//! repository with git2.

pub mod mining;
pub mod parser;
