//! End-to-end engagement report.
//!
//! Runs the pipeline `classify -> cluster -> label -> aggregate -> ages`
//! for both roles. Every stage consumes the previous stage's table and
//! returns a new one.

use std::fmt;

use chrono::{NaiveDate, Weekday};
use orgpulse_core::{
    CommitRecord, CutoffConfig, Granularity, Label, OrgpulseConfig, OrgpulseError, Role,
    Weighting,
};
use orgpulse_identity::classify::{classify_emails, ClassificationTable, DomainClassifier};
use orgpulse_identity::graph::{build_clusters, GraphExport};
use orgpulse_identity::labeler::{label_clusters, LabeledClusters, MembershipRow};
use serde::Serialize;
use tracing::{debug, warn};

use crate::age::{first_activity_ages, DomainAge};
use crate::aggregate::{aggregate_activity, ActivityTable};

/// Settings that shape an [`EngagementReport`].
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Bucket width.
    pub granularity: Granularity,
    /// First day of a week bucket.
    pub week_start: Weekday,
    /// Role whose clusters drive the activity table.
    pub activity_role: Role,
    /// Which percentage the rendered activity table shows.
    pub weighting: Weighting,
    /// Reference dates for first-activity age.
    pub cutoffs: CutoffConfig,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            week_start: Weekday::Mon,
            activity_role: Role::Committer,
            weighting: Weighting::default(),
            cutoffs: CutoffConfig::default(),
        }
    }
}

impl ReportOptions {
    /// Options taken from the `[activity]` and `[cutoff]` sections.
    ///
    /// # Errors
    ///
    /// Returns [`OrgpulseError::Config`] if `week_start` is not a weekday.
    pub fn from_config(config: &OrgpulseConfig) -> Result<Self, OrgpulseError> {
        Ok(Self {
            granularity: config.activity.granularity,
            week_start: config.activity.week_start()?,
            activity_role: config.activity.role,
            weighting: config.activity.weighting,
            cutoffs: config.cutoff.clone(),
        })
    }
}

/// Every per-role output table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleReport {
    /// Role the tables were built for.
    pub role: Role,
    /// Classification of every distinct email.
    pub classification: ClassificationTable,
    /// Labeled identity clusters.
    pub clusters: LabeledClusters,
    /// Email to cluster membership.
    pub membership: Vec<MembershipRow>,
    /// First-activity ages, absent without a cutoff for the role.
    pub ages: Option<Vec<DomainAge>>,
    /// Name/email graph for visualization.
    pub graph: GraphExport,
}

impl RoleReport {
    /// Build the per-role tables for `role`.
    pub fn build(
        records: &[CommitRecord],
        role: Role,
        classifier: &DomainClassifier,
        cutoff: Option<NaiveDate>,
    ) -> Self {
        let classification = classify_emails(records, role, classifier);
        let table = build_clusters(records, role);
        let clusters = label_clusters(&table, &classification);
        let membership = clusters.membership_rows();
        let graph = table.export_graph();

        let ages = match cutoff {
            Some(cutoff) => Some(first_activity_ages(records, &classification, cutoff)),
            None => {
                warn!(%role, "no cutoff configured, skipping first-activity ages");
                None
            }
        };

        Self {
            role,
            classification,
            clusters,
            membership,
            ages,
            graph,
        }
    }
}

/// All output tables for one commit log.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use orgpulse_core::{Allowlists, CommitRecord};
/// use orgpulse_identity::classify::DomainClassifier;
/// use orgpulse_activity::report::{EngagementReport, ReportOptions};
///
/// let d = NaiveDate::from_ymd_opt(2020, 3, 4).unwrap();
/// let records = vec![CommitRecord::new(d, "Ann", "ann@acme.com", d, "Ann", "ann@acme.com", "1")];
/// let classifier = DomainClassifier::new(Allowlists {
///     org: ["acme.com".to_string()].into(),
///     ..Allowlists::default()
/// });
///
/// let report = EngagementReport::build(&records, &ReportOptions::default(), &classifier);
/// assert_eq!(report.commits, 1);
/// assert!(report.to_string().contains("Engagement Report"));
/// assert!(report.to_markdown().contains("# Engagement Report"));
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementReport {
    /// Commit records analyzed.
    pub commits: usize,
    /// Percentage shown in rendered output.
    pub weighting: Weighting,
    /// Tables for author and committer roles.
    pub roles: Vec<RoleReport>,
    /// Activity aggregate for the configured role.
    pub activity: ActivityTable,
}

impl EngagementReport {
    /// Run the full pipeline over `records`.
    pub fn build(
        records: &[CommitRecord],
        options: &ReportOptions,
        classifier: &DomainClassifier,
    ) -> Self {
        let roles = Role::ALL
            .iter()
            .map(|&role| RoleReport::build(records, role, classifier, options.cutoffs.for_role(role)))
            .collect::<Vec<_>>();

        let activity = match roles.iter().find(|r| r.role == options.activity_role) {
            Some(role) => aggregate_activity(
                records,
                &role.clusters,
                options.granularity,
                options.week_start,
            ),
            None => ActivityTable {
                role: options.activity_role,
                granularity: options.granularity,
                rows: Vec::new(),
                totals: Vec::new(),
            },
        };

        debug!(commits = records.len(), buckets = activity.totals.len(), "built engagement report");

        Self {
            commits: records.len(),
            weighting: options.weighting,
            roles,
            activity,
        }
    }

    /// Tables for `role`.
    pub fn role(&self, role: Role) -> Option<&RoleReport> {
        self.roles.iter().find(|r| r.role == role)
    }

    /// Render the report as a markdown string.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Engagement Report\n\n");
        out.push_str(&format!(
            "**Commits:** {} | **Granularity:** {} | **Weighting:** {}\n\n",
            self.commits, self.activity.granularity, self.weighting
        ));

        out.push_str("## Identities\n\n");
        out.push_str("| Role | Emails | Clusters |");
        for label in Label::ALL {
            out.push_str(&format!(" {label} |"));
        }
        out.push_str("\n|------|--------|----------|");
        out.push_str(&"-----|".repeat(Label::ALL.len()));
        out.push('\n');
        for role in &self.roles {
            let counts = role.clusters.label_counts();
            out.push_str(&format!(
                "| {} | {} | {} |",
                role.role,
                role.classification.len(),
                role.clusters.len()
            ));
            for label in Label::ALL {
                out.push_str(&format!(" {} |", counts.get(&label).copied().unwrap_or(0)));
            }
            out.push('\n');
        }
        out.push('\n');

        out.push_str(&format!(
            "## Activity ({} clusters)\n\n",
            self.activity.role
        ));
        if self.activity.totals.is_empty() {
            out.push_str("No activity.\n\n");
        } else {
            out.push_str("| Bucket | Clusters | Commits |");
            for label in Label::ALL {
                out.push_str(&format!(" {label} |"));
            }
            out.push_str("\n|--------|----------|---------|");
            out.push_str(&"-----|".repeat(Label::ALL.len()));
            out.push('\n');
            for total in &self.activity.totals {
                out.push_str(&format!(
                    "| {} | {} | {} |",
                    total.bucket_start, total.clusters, total.commits
                ));
                for share in self.shares(total.bucket_start) {
                    out.push_str(&format!(" {share:.4} |"));
                }
                out.push('\n');
            }
            out.push('\n');
        }

        for role in &self.roles {
            let Some(ages) = &role.ages else {
                continue;
            };
            out.push_str(&format!("## First Activity ({})\n\n", role.role));
            if ages.is_empty() {
                out.push_str("No domains.\n\n");
                continue;
            }
            out.push_str("| Domain | Label | First | Commits | Age (days) |\n");
            out.push_str("|--------|-------|-------|---------|------------|\n");
            for age in ages {
                out.push_str(&format!(
                    "| `{}` | {} | {} | {} | {} |\n",
                    age.domain, age.label, age.first_date, age.commit_count, age.age_days
                ));
            }
            out.push('\n');
        }
        out
    }

    fn shares(&self, start: NaiveDate) -> Vec<f64> {
        Label::ALL
            .iter()
            .map(|&label| self.activity.percentage_for(start, label, self.weighting))
            .collect()
    }
}

impl fmt::Display for EngagementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Engagement Report")?;
        writeln!(f, "=================")?;
        writeln!(
            f,
            "Commits: {}, granularity: {}, weighting: {}\n",
            self.commits, self.activity.granularity, self.weighting
        )?;

        write!(f, "{:<10} {:>7} {:>9}", "Role", "Emails", "Clusters")?;
        for label in Label::ALL {
            write!(f, " {:>9}", label.to_string())?;
        }
        writeln!(f)?;
        writeln!(f, "{}", "-".repeat(28 + 10 * Label::ALL.len()))?;
        for role in &self.roles {
            let counts = role.clusters.label_counts();
            write!(
                f,
                "{:<10} {:>7} {:>9}",
                role.role.to_string(),
                role.classification.len(),
                role.clusters.len()
            )?;
            for label in Label::ALL {
                write!(f, " {:>9}", counts.get(&label).copied().unwrap_or(0))?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\nActivity ({} clusters)", self.activity.role)?;
        if self.activity.totals.is_empty() {
            writeln!(f, "No activity.")?;
        } else {
            write!(f, "{:<12} {:>8} {:>8}", "Bucket", "Clusters", "Commits")?;
            for label in Label::ALL {
                write!(f, " {:>9}", label.to_string())?;
            }
            writeln!(f)?;
            writeln!(f, "{}", "-".repeat(30 + 10 * Label::ALL.len()))?;
            for total in &self.activity.totals {
                write!(
                    f,
                    "{:<12} {:>8} {:>8}",
                    total.bucket_start.to_string(),
                    total.clusters,
                    total.commits
                )?;
                for share in self.shares(total.bucket_start) {
                    write!(f, " {share:>9.4}")?;
                }
                writeln!(f)?;
            }
        }

        for role in &self.roles {
            let Some(ages) = &role.ages else {
                continue;
            };
            writeln!(f, "\nFirst activity ({})", role.role)?;
            for age in ages {
                writeln!(
                    f,
                    "{:<32} {:<9} {} {:>7} {:>8}",
                    age.domain,
                    age.label.to_string(),
                    age.first_date,
                    age.commit_count,
                    age.age_days
                )?;
            }
        }
        Ok(())
    }
}
