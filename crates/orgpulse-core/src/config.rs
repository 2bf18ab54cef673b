use std::collections::BTreeSet;
use std::path::Path;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::OrgpulseError;
use crate::types::{Granularity, Role, Weighting};

/// Top-level configuration loaded from `.orgpulse.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use orgpulse_core::{Granularity, OrgpulseConfig};
///
/// let config = OrgpulseConfig::default();
/// assert_eq!(config.activity.granularity, Granularity::Month);
/// assert_eq!(config.input.delimiter, '|');
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgpulseConfig {
    /// Domain allowlists used by the classifier.
    #[serde(default)]
    pub classify: ClassifyConfig,
    /// Temporal aggregation settings.
    #[serde(default)]
    pub activity: ActivityConfig,
    /// Reference cutoff dates for first-activity age.
    #[serde(default)]
    pub cutoff: CutoffConfig,
    /// Raw log parsing settings.
    #[serde(default)]
    pub input: InputConfig,
    /// Repository mining settings.
    #[serde(default)]
    pub mining: MiningConfig,
}

impl OrgpulseConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`OrgpulseError::FileNotFound`] if the file does not exist,
    /// [`OrgpulseError::Io`] if it cannot be read, or
    /// [`OrgpulseError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use orgpulse_core::OrgpulseConfig;
    /// use std::path::Path;
    ///
    /// let config = OrgpulseConfig::from_file(Path::new(".orgpulse.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, OrgpulseError> {
        if !path.exists() {
            return Err(OrgpulseError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`OrgpulseError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use orgpulse_core::{Granularity, OrgpulseConfig};
    ///
    /// let toml = r#"
    /// [activity]
    /// granularity = "quarter"
    /// "#;
    /// let config = OrgpulseConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.activity.granularity, Granularity::Quarter);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, OrgpulseError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Allowlists that drive domain classification.
///
/// Both lists are required: `None` means the key was absent from the
/// configuration, which is a fatal boundary error. An explicitly empty list
/// is accepted.
///
/// # Examples
///
/// ```
/// use orgpulse_core::ClassifyConfig;
///
/// let config = ClassifyConfig {
///     personal_domains: Some(vec!["Gmail.com".into()]),
///     org_domains: Some(vec!["@google.com".into()]),
///     platform_noreply_domain: None,
/// };
/// let lists = config.allowlists().unwrap();
/// assert!(lists.personal.contains("gmail.com"));
/// assert!(lists.org.contains("google.com"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Registered domains of personal email hosting providers.
    pub personal_domains: Option<Vec<String>>,
    /// Registered domains owned by the organization under study.
    pub org_domains: Option<Vec<String>>,
    /// Hosting platform domain whose committer signatures count as `Org`.
    pub platform_noreply_domain: Option<String>,
}

/// Normalized, validated allowlists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlists {
    /// Personal hosting providers.
    pub personal: BTreeSet<String>,
    /// Organization-owned domains.
    pub org: BTreeSet<String>,
    /// Committer-only platform no-reply domain.
    pub platform_noreply: Option<String>,
}

impl ClassifyConfig {
    /// Validate and normalize the allowlists.
    ///
    /// Entries are trimmed, lower-cased, and stripped of a leading `@` or `.`;
    /// blank entries are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`OrgpulseError::Config`] when either allowlist is missing.
    pub fn allowlists(&self) -> Result<Allowlists, OrgpulseError> {
        let personal = self.personal_domains.as_ref().ok_or_else(|| {
            OrgpulseError::Config("missing `personal_domains` in [classify]".into())
        })?;
        let org = self
            .org_domains
            .as_ref()
            .ok_or_else(|| OrgpulseError::Config("missing `org_domains` in [classify]".into()))?;

        Ok(Allowlists {
            personal: personal.iter().filter_map(|d| normalize_domain(d)).collect(),
            org: org.iter().filter_map(|d| normalize_domain(d)).collect(),
            platform_noreply: self
                .platform_noreply_domain
                .as_deref()
                .and_then(normalize_domain),
        })
    }
}

fn normalize_domain(raw: &str) -> Option<String> {
    let domain = raw
        .trim()
        .trim_start_matches(['@', '.'])
        .trim_end_matches('.')
        .to_lowercase();
    (!domain.is_empty()).then_some(domain)
}

/// Temporal aggregation configuration.
///
/// # Examples
///
/// ```
/// use orgpulse_core::{ActivityConfig, Role, Weighting};
///
/// let config = ActivityConfig::default();
/// assert_eq!(config.role, Role::Committer);
/// assert_eq!(config.weighting, Weighting::Clusters);
/// assert_eq!(config.week_start().unwrap(), chrono::Weekday::Mon);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Bucket width (default: month).
    #[serde(default)]
    pub granularity: Granularity,
    /// First day of a week bucket (default: `"monday"`).
    #[serde(default = "default_week_start")]
    pub week_start: String,
    /// Role whose clusters drive aggregation (default: committer).
    #[serde(default = "default_activity_role")]
    pub role: Role,
    /// Which percentage reports put forward (default: clusters).
    #[serde(default)]
    pub weighting: Weighting,
}

fn default_week_start() -> String {
    "monday".into()
}

fn default_activity_role() -> Role {
    Role::Committer
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            week_start: default_week_start(),
            role: default_activity_role(),
            weighting: Weighting::default(),
        }
    }
}

impl ActivityConfig {
    /// Parse the configured week start.
    ///
    /// # Errors
    ///
    /// Returns [`OrgpulseError::Config`] for an unrecognized weekday name.
    pub fn week_start(&self) -> Result<Weekday, OrgpulseError> {
        self.week_start
            .trim()
            .parse::<Weekday>()
            .map_err(|_| OrgpulseError::Config(format!("invalid week_start: {}", self.week_start)))
    }
}

/// Fixed reference dates for first-activity age, per role.
///
/// Dates are written as quoted `"YYYY-MM-DD"` strings.
///
/// # Examples
///
/// ```
/// use orgpulse_core::{OrgpulseConfig, Role};
///
/// let config = OrgpulseConfig::from_toml("[cutoff]\nauthor = \"2024-01-01\"").unwrap();
/// assert!(config.cutoff.for_role(Role::Author).is_some());
/// assert!(config.cutoff.for_role(Role::Committer).is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CutoffConfig {
    /// Cutoff applied to author dates.
    pub author: Option<NaiveDate>,
    /// Cutoff applied to committer dates.
    pub committer: Option<NaiveDate>,
}

impl CutoffConfig {
    /// Cutoff configured for `role`, if any.
    pub fn for_role(&self, role: Role) -> Option<NaiveDate> {
        match role {
            Role::Author => self.author,
            Role::Committer => self.committer,
        }
    }
}

/// Raw log parsing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Field delimiter, guaranteed absent from names and emails (default: `|`).
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_delimiter() -> char {
    '|'
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
        }
    }
}

/// Repository mining configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Branch to walk (default: HEAD).
    pub branch: Option<String>,
    /// Stop after this many commits.
    pub max_commits: Option<usize>,
}
