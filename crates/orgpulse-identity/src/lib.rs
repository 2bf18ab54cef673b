//! Identity resolution: domain classification and alias clustering.
//!
//! Classifies every email domain into an organizational [`Label`], merges
//! the name/email aliases of each contributor into identity clusters via
//! union-find, and labels each cluster with a category and a representative
//! name and email. Author and committer identities are resolved separately.
//!
//! [`Label`]: orgpulse_core::Label

pub mod classify;
pub mod graph;
pub mod labeler;
