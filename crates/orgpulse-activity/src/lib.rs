//! Temporal aggregation of commit activity.
//!
//! Buckets commits into calendar windows, computes per-label shares of the
//! active identity clusters in each window, measures how long each domain
//! has been active, and assembles everything into an [`report::EngagementReport`].

pub mod age;
pub mod aggregate;
pub mod bucket;
pub mod report;
