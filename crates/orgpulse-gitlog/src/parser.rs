//! Delimited `git log` text parsing.
//!
//! Each line carries seven fields: author date, author name, author email,
//! committer date, committer name, committer email, short hash. Malformed
//! lines are skipped and reported, never fatal.

use std::fmt;

use chrono::NaiveDate;
use orgpulse_core::CommitRecord;
use serde::Serialize;
use tracing::{debug, warn};

/// `git log` invocation whose output [`parse_log`] understands with the
/// default `|` delimiter.
pub const LOG_FORMAT: &str =
    "git log --date=short --pretty=format:%ad|%an|%ae|%cd|%cn|%ce|%h";

const FIELD_COUNT: usize = 7;

/// Why a log line was discarded.
///
/// # Examples
///
/// ```
/// use orgpulse_gitlog::parser::SkipReason;
///
/// let reason = SkipReason::FieldCount(3);
/// assert_eq!(reason.to_string(), "expected 7 fields, found 3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "detail")]
pub enum SkipReason {
    /// The line did not split into exactly seven fields.
    FieldCount(usize),
    /// The author date could not be parsed.
    AuthorDate(String),
    /// The committer date could not be parsed.
    CommitterDate(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FieldCount(n) => write!(f, "expected {FIELD_COUNT} fields, found {n}"),
            SkipReason::AuthorDate(raw) => write!(f, "unparsable author date '{raw}'"),
            SkipReason::CommitterDate(raw) => write!(f, "unparsable committer date '{raw}'"),
        }
    }
}

/// A discarded input line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedLine {
    /// 1-based line number in the input.
    pub line: usize,
    /// Why it was discarded.
    pub reason: SkipReason,
}

/// Result of parsing a log: usable records plus what was dropped.
#[derive(Debug, Clone, Default)]
pub struct ParsedLog {
    /// Records in input order.
    pub records: Vec<CommitRecord>,
    /// Lines that could not be turned into records.
    pub skipped: Vec<SkippedLine>,
}

/// Parse delimited log text into commit records.
///
/// Blank lines are ignored. Dates accept `YYYY-MM-DD` or any longer ISO-8601
/// string starting with one. Emails are lower-cased.
///
/// # Examples
///
/// ```
/// use orgpulse_gitlog::parser::parse_log;
///
/// let log = "2018-02-26|Alice|Alice@Gmail.com|2018-02-27|Alice|alice@gmail.com|abc1234\n\
///            not a commit line\n";
/// let parsed = parse_log(log, '|');
/// assert_eq!(parsed.records.len(), 1);
/// assert_eq!(parsed.records[0].author_email, "alice@gmail.com");
/// assert_eq!(parsed.skipped.len(), 1);
/// assert_eq!(parsed.skipped[0].line, 2);
/// ```
pub fn parse_log(input: &str, delimiter: char) -> ParsedLog {
    let mut parsed = ParsedLog::default();
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        match parse_line(line, delimiter) {
            Ok(record) => parsed.records.push(record),
            Err(reason) => {
                warn!(line = idx + 1, %reason, "skipping malformed log line");
                parsed.skipped.push(SkippedLine {
                    line: idx + 1,
                    reason,
                });
            }
        }
    }

    debug!(
        records = parsed.records.len(),
        skipped = parsed.skipped.len(),
        "parsed commit log"
    );
    parsed
}

fn parse_line(line: &str, delimiter: char) -> Result<CommitRecord, SkipReason> {
    let fields: Vec<&str> = line.split(delimiter).collect();
    if fields.len() != FIELD_COUNT {
        return Err(SkipReason::FieldCount(fields.len()));
    }

    let author_date =
        parse_date(fields[0]).ok_or_else(|| SkipReason::AuthorDate(fields[0].to_string()))?;
    let committer_date =
        parse_date(fields[3]).ok_or_else(|| SkipReason::CommitterDate(fields[3].to_string()))?;

    Ok(CommitRecord::new(
        author_date,
        fields[1],
        fields[2],
        committer_date,
        fields[4],
        fields[5],
        fields[6],
    ))
}

/// Parse a calendar date from the first ten characters of `raw`.
///
/// # Examples
///
/// ```
/// use orgpulse_gitlog::parser::parse_date;
///
/// assert!(parse_date("2018-02-26").is_some());
/// assert!(parse_date("2018-02-26 10:11:12 +0100").is_some());
/// assert!(parse_date("26/02/2018").is_none());
/// ```
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}
