use chrono::{NaiveDate, Weekday};
use orgpulse_activity::aggregate::aggregate_activity;
use orgpulse_activity::bucket::floor_date;
use orgpulse_core::{Allowlists, CommitRecord, Granularity, Role};
use orgpulse_identity::classify::{classify_emails, DomainClassifier};
use orgpulse_identity::graph::build_clusters;
use orgpulse_identity::labeler::label_clusters;
use proptest::prelude::*;

const NAMES: &[&str] = &["Alice", "Bob", "Carol", "Dan", "Eve", ""];
const EMAILS: &[&str] = &[
    "alice@gmail.com",
    "alice@google.com",
    "bob@mit.edu",
    "carol@student.ox.ac.uk",
    "dan",
    "dan@localhost",
    "eve@example.org",
    "eve@yahoo.com",
    "",
];
const GRANULARITIES: [Granularity; 5] = [
    Granularity::Week,
    Granularity::Month,
    Granularity::Quarter,
    Granularity::HalfYear,
    Granularity::Year,
];
const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap()
}

fn records_strategy() -> impl Strategy<Value = Vec<CommitRecord>> {
    prop::collection::vec((0..NAMES.len(), 0..EMAILS.len(), 0i64..2000), 0..60).prop_map(|rows| {
        rows.into_iter()
            .map(|(n, e, offset)| {
                let date = base() + chrono::Duration::days(offset);
                CommitRecord::new(date, NAMES[n], EMAILS[e], date, NAMES[n], EMAILS[e], "p")
            })
            .collect()
    })
}

fn classifier() -> DomainClassifier {
    DomainClassifier::new(Allowlists {
        personal: ["gmail.com", "yahoo.com"].iter().map(|s| s.to_string()).collect(),
        org: ["google.com".to_string()].into(),
        platform_noreply: None,
    })
}

proptest! {
    #[test]
    fn bucket_percentages_sum_to_one(
        records in records_strategy(),
        g in 0..GRANULARITIES.len(),
        w in 0..WEEKDAYS.len(),
    ) {
        let classification = classify_emails(&records, Role::Author, &classifier());
        let clusters = label_clusters(&build_clusters(&records, Role::Author), &classification);
        let table = aggregate_activity(&records, &clusters, GRANULARITIES[g], WEEKDAYS[w]);

        for total in &table.totals {
            let rows: Vec<_> = table.rows_for(total.bucket_start).collect();
            let tolerance = 0.0001 * rows.len() as f64;

            let clusters: f64 = rows.iter().map(|r| r.percentage).sum();
            prop_assert!((clusters - 1.0).abs() <= tolerance, "cluster sum {}", clusters);
            let commits: f64 = rows.iter().map(|r| r.commit_percentage).sum();
            prop_assert!((commits - 1.0).abs() <= tolerance, "commit sum {}", commits);

            let counted: usize = rows.iter().map(|r| r.commit_count).sum();
            prop_assert_eq!(counted, total.commits);
        }
    }

    #[test]
    fn floor_is_stable_and_bounded(offset in 0i64..20_000, g in 0..GRANULARITIES.len(), w in 0..WEEKDAYS.len()) {
        let date = base() + chrono::Duration::days(offset);
        let start = floor_date(date, GRANULARITIES[g], WEEKDAYS[w]);
        prop_assert!(start <= date);
        prop_assert!((date - start).num_days() < 366);
        prop_assert_eq!(floor_date(start, GRANULARITIES[g], WEEKDAYS[w]), start);
    }
}
