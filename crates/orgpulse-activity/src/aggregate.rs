//! Per-bucket, per-label activity aggregation.
//!
//! For each calendar bucket, counts the distinct identity clusters active in
//! it and their commits, split by cluster label. Shares are rounded to four
//! decimal places.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Weekday};
use orgpulse_core::{CommitRecord, Granularity, Label, Role, Weighting};
use orgpulse_identity::labeler::LabeledClusters;
use serde::Serialize;
use tracing::debug;

use crate::bucket::floor_date;

/// Activity of one label within one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRow {
    /// First day of the bucket.
    pub bucket_start: NaiveDate,
    /// Bucket width.
    pub granularity: Granularity,
    /// Cluster label.
    pub label: Label,
    /// Distinct clusters with this label active in the bucket.
    pub cluster_count: usize,
    /// Commits in the bucket by clusters with this label.
    pub commit_count: usize,
    /// `cluster_count / clusters active in bucket`.
    pub percentage: f64,
    /// `commit_count / commits in bucket`.
    pub commit_percentage: f64,
}

impl ActivityRow {
    /// The share selected by `weighting`.
    pub fn share(&self, weighting: Weighting) -> f64 {
        match weighting {
            Weighting::Clusters => self.percentage,
            Weighting::Commits => self.commit_percentage,
        }
    }
}

/// Totals of one bucket across all labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketTotal {
    /// First day of the bucket.
    pub bucket_start: NaiveDate,
    /// Distinct clusters active in the bucket.
    pub clusters: usize,
    /// Commits in the bucket.
    pub commits: usize,
}

/// The activity-aggregate table.
///
/// # Examples
///
/// ```
/// use chrono::Weekday;
/// use orgpulse_core::{Allowlists, Granularity, Role};
/// use orgpulse_identity::classify::{classify_emails, DomainClassifier};
/// use orgpulse_identity::graph::build_clusters;
/// use orgpulse_identity::labeler::label_clusters;
/// use orgpulse_activity::aggregate::aggregate_activity;
///
/// let records = vec![];
/// let clusters = label_clusters(
///     &build_clusters(&records, Role::Committer),
///     &classify_emails(&records, Role::Committer, &DomainClassifier::new(Allowlists::default())),
/// );
/// let table = aggregate_activity(&records, &clusters, Granularity::Month, Weekday::Mon);
/// assert!(table.rows.is_empty());
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTable {
    /// Role whose clusters were counted.
    pub role: Role,
    /// Bucket width.
    pub granularity: Granularity,
    /// Rows ordered by bucket start, then label.
    pub rows: Vec<ActivityRow>,
    /// Per-bucket totals ordered by bucket start.
    pub totals: Vec<BucketTotal>,
}

impl ActivityTable {
    /// Share of `label` in the bucket starting at `start`, selected by
    /// `weighting`; zero when the label was not active there.
    pub fn percentage_for(&self, start: NaiveDate, label: Label, weighting: Weighting) -> f64 {
        self.rows_for(start)
            .find(|r| r.label == label)
            .map_or(0.0, |r| r.share(weighting))
    }

    /// Rows of the bucket starting at `start`.
    pub fn rows_for(&self, start: NaiveDate) -> impl Iterator<Item = &ActivityRow> {
        self.rows.iter().filter(move |r| r.bucket_start == start)
    }

    /// Share of `label` in each bucket under `weighting`, zero where absent.
    pub fn series(&self, label: Label, weighting: Weighting) -> Vec<(NaiveDate, f64)> {
        self.totals
            .iter()
            .map(|t| (t.bucket_start, self.percentage_for(t.bucket_start, label, weighting)))
            .collect()
    }
}

#[derive(Default)]
struct Tally {
    clusters: BTreeSet<usize>,
    commits: usize,
}

/// Aggregate commit activity of `clusters.role` into buckets.
///
/// Records whose email in that role belongs to no cluster (empty emails)
/// are not counted.
pub fn aggregate_activity(
    records: &[CommitRecord],
    clusters: &LabeledClusters,
    granularity: Granularity,
    week_start: Weekday,
) -> ActivityTable {
    let role = clusters.role;
    let mut buckets: BTreeMap<NaiveDate, Tally> = BTreeMap::new();
    let mut labeled: BTreeMap<(NaiveDate, Label), Tally> = BTreeMap::new();

    for record in records {
        let Some(cluster) = clusters.cluster_for_email(record.email(role)) else {
            continue;
        };
        let start = floor_date(record.date(role), granularity, week_start);

        let total = buckets.entry(start).or_default();
        total.clusters.insert(cluster.cluster_id);
        total.commits += 1;

        let tally = labeled.entry((start, cluster.label)).or_default();
        tally.clusters.insert(cluster.cluster_id);
        tally.commits += 1;
    }

    let rows = labeled
        .into_iter()
        .map(|((bucket_start, label), tally)| {
            let total = &buckets[&bucket_start];
            ActivityRow {
                bucket_start,
                granularity,
                label,
                cluster_count: tally.clusters.len(),
                commit_count: tally.commits,
                percentage: ratio(tally.clusters.len(), total.clusters.len()),
                commit_percentage: ratio(tally.commits, total.commits),
            }
        })
        .collect::<Vec<_>>();

    let totals = buckets
        .into_iter()
        .map(|(bucket_start, t)| BucketTotal {
            bucket_start,
            clusters: t.clusters.len(),
            commits: t.commits,
        })
        .collect::<Vec<_>>();

    debug!(%role, %granularity, buckets = totals.len(), rows = rows.len(), "aggregated activity");

    ActivityTable {
        role,
        granularity,
        rows,
        totals,
    }
}

/// `part / whole` rounded to four decimal places; zero for an empty whole.
///
/// # Examples
///
/// ```
/// use orgpulse_activity::aggregate::ratio;
///
/// assert_eq!(ratio(1, 3), 0.3333);
/// assert_eq!(ratio(2, 3), 0.6667);
/// assert_eq!(ratio(0, 0), 0.0);
/// ```
pub fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgpulse_core::Allowlists;
    use orgpulse_identity::classify::{classify_emails, DomainClassifier};
    use orgpulse_identity::graph::build_clusters;
    use orgpulse_identity::labeler::label_clusters;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn commit(date: NaiveDate, name: &str, email: &str) -> CommitRecord {
        CommitRecord::new(date, name, email, date, name, email, "h")
    }

    fn table(records: &[CommitRecord], granularity: Granularity) -> ActivityTable {
        let classifier = DomainClassifier::new(Allowlists {
            personal: ["gmail.com".to_string()].into(),
            org: ["acme.com".to_string()].into(),
            platform_noreply: None,
        });
        let clusters = label_clusters(
            &build_clusters(records, Role::Committer),
            &classify_emails(records, Role::Committer, &classifier),
        );
        aggregate_activity(records, &clusters, granularity, Weekday::Mon)
    }

    #[test]
    fn counts_distinct_clusters_and_commits_per_label() {
        let records = vec![
            commit(day(2020, 1, 2), "Ann", "ann@acme.com"),
            commit(day(2020, 1, 3), "Ann", "ann@gmail.com"),
            commit(day(2020, 1, 4), "Bo", "bo@gmail.com"),
            commit(day(2020, 1, 5), "Cy", "cy@mit.edu"),
            commit(day(2020, 2, 1), "Bo", "bo@gmail.com"),
        ];
        let t = table(&records, Granularity::Month);

        assert_eq!(t.totals.len(), 2);
        assert_eq!(t.totals[0].clusters, 3);
        assert_eq!(t.totals[0].commits, 4);

        let jan: Vec<&ActivityRow> = t.rows_for(day(2020, 1, 1)).collect();
        assert_eq!(jan.len(), 3);
        assert_eq!(jan[0].label, Label::Org);
        assert_eq!(jan[0].cluster_count, 1);
        assert_eq!(jan[0].commit_count, 2);
        assert_eq!(jan[0].percentage, 0.3333);
        assert_eq!(jan[0].commit_percentage, 0.5);
        assert_eq!(jan[1].label, Label::Personal);
        assert_eq!(jan[2].label, Label::Edu);
        assert_eq!(jan[2].commit_percentage, 0.25);

        let feb: Vec<&ActivityRow> = t.rows_for(day(2020, 2, 1)).collect();
        assert_eq!(feb.len(), 1);
        assert_eq!(feb[0].percentage, 1.0);
    }

    #[test]
    fn cluster_counts_once_per_bucket_regardless_of_commits() {
        let records = vec![
            commit(day(2021, 3, 1), "Dee", "dee@gmail.com"),
            commit(day(2021, 3, 2), "Dee", "dee@gmail.com"),
            commit(day(2021, 3, 3), "Dee", "dee@gmail.com"),
            commit(day(2021, 3, 4), "Eli", "eli@example.org"),
        ];
        let t = table(&records, Granularity::Quarter);
        assert_eq!(t.totals[0].bucket_start, day(2021, 1, 1));
        let rows: Vec<&ActivityRow> = t.rows_for(day(2021, 1, 1)).collect();
        assert_eq!(rows[0].label, Label::Personal);
        assert_eq!(rows[0].share(Weighting::Clusters), 0.5);
        assert_eq!(rows[0].share(Weighting::Commits), 0.75);
        let q1 = day(2021, 1, 1);
        assert_eq!(t.percentage_for(q1, Label::Personal, Weighting::Clusters), 0.5);
        assert_eq!(t.percentage_for(q1, Label::Personal, Weighting::Commits), 0.75);
        assert_eq!(t.percentage_for(q1, Label::Other, Weighting::Commits), 0.25);
        assert_eq!(t.percentage_for(q1, Label::Org, Weighting::Clusters), 0.0);
        assert_eq!(t.percentage_for(day(2021, 4, 1), Label::Personal, Weighting::Clusters), 0.0);
    }

    #[test]
    fn empty_email_records_are_not_counted() {
        let records = vec![
            commit(day(2021, 3, 1), "Ghost", ""),
            commit(day(2021, 3, 1), "Real", "real@gmail.com"),
        ];
        let t = table(&records, Granularity::Year);
        assert_eq!(t.totals[0].commits, 1);
        assert_eq!(t.totals[0].clusters, 1);
    }

    #[test]
    fn series_fills_missing_buckets_with_zero() {
        let records = vec![
            commit(day(2020, 1, 1), "Ann", "ann@acme.com"),
            commit(day(2020, 2, 1), "Bo", "bo@gmail.com"),
        ];
        let t = table(&records, Granularity::Month);
        let org = t.series(Label::Org, Weighting::Clusters);
        assert_eq!(org, vec![(day(2020, 1, 1), 1.0), (day(2020, 2, 1), 0.0)]);
    }

    #[test]
    fn percentages_in_each_bucket_sum_to_one() {
        let records = vec![
            commit(day(2020, 5, 1), "A", "a@acme.com"),
            commit(day(2020, 5, 2), "B", "b@gmail.com"),
            commit(day(2020, 5, 3), "C", "c@mit.edu"),
            commit(day(2020, 5, 4), "D", "d@example.org"),
            commit(day(2020, 5, 5), "E", "e"),
            commit(day(2020, 5, 6), "F", "f@gmail.com"),
        ];
        let t = table(&records, Granularity::Month);
        let rows: Vec<&ActivityRow> = t.rows_for(day(2020, 5, 1)).collect();
        assert_eq!(rows.len(), 5);
        let sum: f64 = rows.iter().map(|r| r.percentage).sum();
        assert!((sum - 1.0).abs() <= 0.0001 * rows.len() as f64);
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let t = table(&[], Granularity::Month);
        assert!(t.rows.is_empty());
        assert!(t.totals.is_empty());
    }
}
