use std::collections::BTreeSet;

use chrono::NaiveDate;
use orgpulse_core::{Allowlists, CommitRecord, Role};
use orgpulse_identity::classify::DomainClassifier;
use orgpulse_identity::graph::build_clusters;
use proptest::prelude::*;

const NAMES: &[&str] = &["Alice", "Bob", "Carol", "Dan", ""];
const EMAILS: &[&str] = &[
    "alice@gmail.com",
    "alice@google.com",
    "bob@mit.edu",
    "carol@student.ox.ac.uk",
    "dan",
    "dan@localhost",
    "eve@example.org",
    "",
];

fn record(name: usize, email: usize, day: u32) -> CommitRecord {
    let date = NaiveDate::from_ymd_opt(2020, 1, 1 + day % 28).unwrap();
    CommitRecord::new(date, NAMES[name], EMAILS[email], date, NAMES[name], EMAILS[email], "p")
}

fn records_strategy() -> impl Strategy<Value = Vec<CommitRecord>> {
    prop::collection::vec((0..NAMES.len(), 0..EMAILS.len(), 0u32..28), 0..40)
        .prop_map(|rows| rows.into_iter().map(|(n, e, d)| record(n, e, d)).collect())
}

fn classifier() -> DomainClassifier {
    DomainClassifier::new(Allowlists {
        personal: ["gmail.com".to_string()].into(),
        org: ["google.com".to_string()].into(),
        platform_noreply: None,
    })
}

proptest! {
    #[test]
    fn classification_is_deterministic(email in "[a-z]{0,6}(@([a-z]{1,5}\\.){0,3}[a-z]{2,4})?") {
        let classifier = classifier();
        for role in Role::ALL {
            prop_assert_eq!(classifier.classify(&email, role), classifier.classify(&email, role));
        }
    }

    #[test]
    fn every_email_is_in_exactly_one_cluster(records in records_strategy()) {
        let table = build_clusters(&records, Role::Author);
        let distinct: BTreeSet<&str> = records
            .iter()
            .map(|r| r.author_email.as_str())
            .filter(|e| !e.is_empty())
            .collect();

        prop_assert!(table.len() <= distinct.len());
        let mut seen = BTreeSet::new();
        for cluster in table.clusters() {
            for member in &cluster.members {
                prop_assert!(seen.insert(member.clone()), "{} in two clusters", member);
                prop_assert_eq!(table.cluster_of(member), Some(cluster.id));
            }
        }
        prop_assert_eq!(seen.len(), distinct.len());
    }

    #[test]
    fn shared_cluster_is_transitive(records in records_strategy()) {
        let table = build_clusters(&records, Role::Author);
        let emails: Vec<&str> = EMAILS.iter().copied().filter(|e| table.cluster_of(e).is_some()).collect();
        for a in &emails {
            for b in &emails {
                for c in &emails {
                    if table.cluster_of(a) == table.cluster_of(b)
                        && table.cluster_of(b) == table.cluster_of(c)
                    {
                        prop_assert_eq!(table.cluster_of(a), table.cluster_of(c));
                    }
                }
            }
        }
    }

    #[test]
    fn cluster_ids_ignore_input_order(records in records_strategy()) {
        let forward = build_clusters(&records, Role::Author);
        let mut reversed = records.clone();
        reversed.reverse();
        let backward = build_clusters(&reversed, Role::Author);
        prop_assert_eq!(forward.clusters(), backward.clusters());
    }

    #[test]
    fn linking_record_strictly_merges(records in records_strategy(), pick in 0usize..1000) {
        let table = build_clusters(&records, Role::Author);
        // Find an email that carries a name and a member of a different cluster.
        let named: Vec<&CommitRecord> = records
            .iter()
            .filter(|r| !r.author_name.is_empty() && !r.author_email.is_empty())
            .collect();
        prop_assume!(!named.is_empty());
        let anchor = named[pick % named.len()];
        let anchor_cluster = table.cluster_of(&anchor.author_email);
        let other = table
            .clusters()
            .iter()
            .find(|c| Some(c.id) != anchor_cluster)
            .map(|c| c.members[0].clone());
        prop_assume!(other.is_some());
        let other = other.unwrap();

        let mut linked = records.clone();
        let d = anchor.author_date;
        linked.push(CommitRecord::new(d, &anchor.author_name, &other, d, "x", "x@x.org", "link"));
        let merged = build_clusters(&linked, Role::Author);

        prop_assert_eq!(merged.len() + 1, table.len());
        prop_assert_eq!(merged.cluster_of(&anchor.author_email), merged.cluster_of(&other));
    }
}
