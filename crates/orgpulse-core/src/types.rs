use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One commit from the version-control log.
///
/// Emails are stored trimmed and lower-cased, names trimmed. Records are
/// never merged or split after ingestion.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use orgpulse_core::{CommitRecord, Role};
///
/// let date = NaiveDate::from_ymd_opt(2018, 2, 26).unwrap();
/// let record = CommitRecord::new(
///     date, " Alice Smith ", "Alice@Google.com",
///     date, "GitHub", "noreply@github.com",
///     "abc1234",
/// );
/// assert_eq!(record.email(Role::Author), "alice@google.com");
/// assert_eq!(record.name(Role::Author), "Alice Smith");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    /// Calendar date the change was authored.
    pub author_date: NaiveDate,
    /// Author display name.
    pub author_name: String,
    /// Author email, lower-cased.
    pub author_email: String,
    /// Calendar date the change was committed.
    pub committer_date: NaiveDate,
    /// Committer display name.
    pub committer_name: String,
    /// Committer email, lower-cased.
    pub committer_email: String,
    /// Short commit hash.
    pub hash: String,
}

impl CommitRecord {
    /// Build a record, normalizing names and emails.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        author_date: NaiveDate,
        author_name: &str,
        author_email: &str,
        committer_date: NaiveDate,
        committer_name: &str,
        committer_email: &str,
        hash: &str,
    ) -> Self {
        Self {
            author_date,
            author_name: author_name.trim().to_string(),
            author_email: normalize_email(author_email),
            committer_date,
            committer_name: committer_name.trim().to_string(),
            committer_email: normalize_email(committer_email),
            hash: hash.trim().to_string(),
        }
    }

    /// Date of the commit as seen by `role`.
    pub fn date(&self, role: Role) -> NaiveDate {
        match role {
            Role::Author => self.author_date,
            Role::Committer => self.committer_date,
        }
    }

    /// Name recorded for `role`.
    pub fn name(&self, role: Role) -> &str {
        match role {
            Role::Author => &self.author_name,
            Role::Committer => &self.committer_name,
        }
    }

    /// Email recorded for `role`.
    pub fn email(&self, role: Role) -> &str {
        match role {
            Role::Author => &self.author_email,
            Role::Committer => &self.committer_email,
        }
    }
}

/// Trim and lower-case an email address.
///
/// # Examples
///
/// ```
/// assert_eq!(orgpulse_core::normalize_email("  Bob@Example.ORG "), "bob@example.org");
/// ```
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Which signature of a commit an observation comes from.
///
/// Author and committer identities are resolved independently and never
/// merged with each other.
///
/// # Examples
///
/// ```
/// use orgpulse_core::Role;
///
/// let role: Role = "committer".parse().unwrap();
/// assert_eq!(role, Role::Committer);
/// assert_eq!(Role::Author.to_string(), "author");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person who wrote the change.
    Author,
    /// The person (or platform) that applied the change.
    Committer,
}

impl Role {
    /// Both roles, author first.
    pub const ALL: [Role; 2] = [Role::Author, Role::Committer];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Author => write!(f, "author"),
            Role::Committer => write!(f, "committer"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "author" => Ok(Role::Author),
            "committer" => Ok(Role::Committer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Organizational category of an email or identity cluster.
///
/// Variant order is the reporting order.
///
/// # Examples
///
/// ```
/// use orgpulse_core::Label;
///
/// let label: Label = serde_json::from_str("\"edu\"").unwrap();
/// assert_eq!(label, Label::Edu);
/// assert_eq!(label.to_string(), "Edu");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    /// Domain owned by the organization under study.
    Org,
    /// Personal email hosting provider.
    Personal,
    /// Academic institution.
    Edu,
    /// Any other registered domain.
    Other,
    /// No usable domain (missing `@`, empty or bare host).
    Local,
}

impl Label {
    /// All labels in reporting order.
    pub const ALL: [Label; 5] = [
        Label::Org,
        Label::Personal,
        Label::Edu,
        Label::Other,
        Label::Local,
    ];
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Org => write!(f, "Org"),
            Label::Personal => write!(f, "Personal"),
            Label::Edu => write!(f, "Edu"),
            Label::Other => write!(f, "Other"),
            Label::Local => write!(f, "Local"),
        }
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "org" => Ok(Label::Org),
            "personal" => Ok(Label::Personal),
            "edu" => Ok(Label::Edu),
            "other" => Ok(Label::Other),
            "local" => Ok(Label::Local),
            other => Err(format!("unknown label: {other}")),
        }
    }
}

/// Width of the calendar window commits are bucketed into.
///
/// # Examples
///
/// ```
/// use orgpulse_core::Granularity;
///
/// let g: Granularity = "half-year".parse().unwrap();
/// assert_eq!(g, Granularity::HalfYear);
/// assert_eq!(Granularity::default(), Granularity::Month);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    /// Seven days starting at the configured week start.
    Week,
    /// Calendar month.
    #[default]
    Month,
    /// Calendar quarter starting in Jan, Apr, Jul or Oct.
    Quarter,
    /// Half year starting in Jan or Jul.
    HalfYear,
    /// Calendar year.
    Year,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Week => write!(f, "week"),
            Granularity::Month => write!(f, "month"),
            Granularity::Quarter => write!(f, "quarter"),
            Granularity::HalfYear => write!(f, "half-year"),
            Granularity::Year => write!(f, "year"),
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            "quarter" | "quarterly" => Ok(Granularity::Quarter),
            "half-year" | "halfyear" | "half" => Ok(Granularity::HalfYear),
            "year" | "yearly" => Ok(Granularity::Year),
            other => Err(format!("unknown granularity: {other}")),
        }
    }
}

/// Which share an activity report puts forward.
///
/// # Examples
///
/// ```
/// use orgpulse_core::Weighting;
///
/// assert_eq!("commits".parse::<Weighting>().unwrap(), Weighting::Commits);
/// assert_eq!(Weighting::default(), Weighting::Clusters);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// Share of distinct active identity clusters.
    #[default]
    Clusters,
    /// Share of commits.
    Commits,
}

impl fmt::Display for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weighting::Clusters => write!(f, "clusters"),
            Weighting::Commits => write!(f, "commits"),
        }
    }
}

impl FromStr for Weighting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clusters" | "cluster" | "people" => Ok(Weighting::Clusters),
            "commits" | "commit" => Ok(Weighting::Commits),
            other => Err(format!("unknown weighting: {other}")),
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use orgpulse_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
