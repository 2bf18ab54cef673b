//! Commit record extraction via git2.
//!
//! Walks a repository's history and extracts the author and committer
//! signatures of every commit as [`CommitRecord`]s.

use std::path::Path;

use chrono::{DateTime, NaiveDate};
use git2::{Repository, Sort};
use orgpulse_core::{CommitRecord, OrgpulseError};
use tracing::{debug, warn};

/// Options for history mining.
///
/// # Examples
///
/// ```
/// use orgpulse_gitlog::mining::MiningOptions;
///
/// let opts = MiningOptions::default();
/// assert!(opts.branch.is_none());
/// assert!(opts.max_commits.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MiningOptions {
    /// Branch to walk (default: HEAD).
    pub branch: Option<String>,
    /// Keep only the newest N commits.
    pub max_commits: Option<usize>,
}

impl From<&orgpulse_core::MiningConfig> for MiningOptions {
    fn from(config: &orgpulse_core::MiningConfig) -> Self {
        Self {
            branch: config.branch.clone(),
            max_commits: config.max_commits,
        }
    }
}

/// Mine commit records from a git repository.
///
/// Returns records in chronological order (oldest first), so record order
/// doubles as first-seen order downstream. Dates are the calendar date of
/// each signature in its own timezone, as `git log --date=short` shows them.
///
/// # Errors
///
/// Returns [`OrgpulseError::Git`] if the repository cannot be opened or walked.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use orgpulse_gitlog::mining::{mine_records, MiningOptions};
///
/// let records = mine_records(Path::new("."), &MiningOptions::default()).unwrap();
/// for r in &records {
///     println!("{} {} <{}>", r.hash, r.author_name, r.author_email);
/// }
/// ```
pub fn mine_records(
    repo_path: &Path,
    options: &MiningOptions,
) -> Result<Vec<CommitRecord>, OrgpulseError> {
    let repo = Repository::open(repo_path)
        .map_err(|e| OrgpulseError::Git(format!("failed to open repository: {e}")))?;

    let mut revwalk = repo
        .revwalk()
        .map_err(|e| OrgpulseError::Git(format!("failed to create revwalk: {e}")))?;

    revwalk
        .set_sorting(Sort::TIME)
        .map_err(|e| OrgpulseError::Git(format!("failed to set sorting: {e}")))?;

    // Start from HEAD or specified branch
    if let Some(ref branch) = options.branch {
        let reference = repo
            .resolve_reference_from_short_name(branch)
            .map_err(|e| OrgpulseError::Git(format!("failed to resolve branch '{branch}': {e}")))?;
        let oid = reference
            .target()
            .ok_or_else(|| OrgpulseError::Git("branch has no target".into()))?;
        revwalk
            .push(oid)
            .map_err(|e| OrgpulseError::Git(format!("failed to push oid: {e}")))?;
    } else {
        revwalk
            .push_head()
            .map_err(|e| OrgpulseError::Git(format!("failed to push HEAD: {e}")))?;
    }

    let mut records = Vec::new();

    for oid_result in revwalk {
        if options.max_commits.is_some_and(|max| records.len() >= max) {
            break;
        }

        let oid = oid_result.map_err(|e| OrgpulseError::Git(format!("revwalk error: {e}")))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| OrgpulseError::Git(format!("failed to find commit: {e}")))?;

        let author = commit.author();
        let committer = commit.committer();
        let hash = oid.to_string();
        let short = &hash[..hash.len().min(7)];

        let (Some(author_date), Some(committer_date)) =
            (signature_date(&author.when()), signature_date(&committer.when()))
        else {
            warn!(hash = short, "skipping commit with out-of-range timestamp");
            continue;
        };

        records.push(CommitRecord::new(
            author_date,
            &String::from_utf8_lossy(author.name_bytes()),
            &String::from_utf8_lossy(author.email_bytes()),
            committer_date,
            &String::from_utf8_lossy(committer.name_bytes()),
            &String::from_utf8_lossy(committer.email_bytes()),
            short,
        ));
    }

    records.reverse();
    debug!(records = records.len(), path = %repo_path.display(), "mined commit history");
    Ok(records)
}

/// Calendar date of a signature timestamp in the signature's own offset.
fn signature_date(time: &git2::Time) -> Option<NaiveDate> {
    let local = time.seconds() + i64::from(time.offset_minutes()) * 60;
    DateTime::from_timestamp(local, 0).map(|dt| dt.date_naive())
}
