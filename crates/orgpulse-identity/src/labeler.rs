//! Cluster labeling.
//!
//! Gives every identity cluster one category and a representative
//! name/email pair.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use orgpulse_core::{Label, Role};
use serde::Serialize;
use tracing::debug;

use crate::classify::ClassificationTable;
use crate::graph::{ClusterTable, NameEmailObservation};

/// An identity cluster with its category and representative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabeledCluster {
    /// Cluster id from the [`ClusterTable`].
    pub cluster_id: usize,
    /// Role the cluster was built for.
    pub role: Role,
    /// Category of the whole cluster.
    pub label: Label,
    /// Name on the cluster's latest commit.
    pub representative_name: String,
    /// Email on the cluster's latest commit.
    pub representative_email: String,
    /// Member emails, sorted.
    pub members: Vec<String>,
    /// Commits made with any member email.
    pub commit_count: usize,
    /// Date of the cluster's earliest commit.
    pub first_active: NaiveDate,
    /// Date of the cluster's latest commit.
    pub last_active: NaiveDate,
}

/// One row of the cluster-membership output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRow {
    /// Member email.
    pub email: String,
    /// Cluster the email belongs to.
    pub cluster_id: usize,
    /// Role of the clustering.
    pub role: Role,
    /// Label of the email on its own.
    pub email_label: Label,
    /// Label of the whole cluster.
    pub cluster_label: Label,
    /// Representative name of the cluster.
    pub representative_name: String,
    /// Representative email of the cluster.
    pub representative_email: String,
}

/// Labeled clusters of one role.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabeledClusters {
    /// Role the clusters were built for.
    pub role: Role,
    /// Clusters ordered by id.
    pub clusters: Vec<LabeledCluster>,
    #[serde(skip)]
    membership: BTreeMap<String, usize>,
    #[serde(skip)]
    email_labels: BTreeMap<String, Label>,
}

impl LabeledClusters {
    /// Cluster id of `email`.
    pub fn cluster_of(&self, email: &str) -> Option<usize> {
        self.membership.get(email).copied()
    }

    /// Labeled cluster containing `email`.
    pub fn cluster_for_email(&self, email: &str) -> Option<&LabeledCluster> {
        self.cluster_of(email).and_then(|id| self.clusters.get(id))
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether there are no clusters.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Clusters per label, in label order.
    pub fn label_counts(&self) -> BTreeMap<Label, usize> {
        let mut counts = BTreeMap::new();
        for cluster in &self.clusters {
            *counts.entry(cluster.label).or_default() += 1;
        }
        counts
    }

    /// The cluster-membership table, ordered by email.
    pub fn membership_rows(&self) -> Vec<MembershipRow> {
        self.membership
            .iter()
            .filter_map(|(email, &id)| {
                let cluster = self.clusters.get(id)?;
                Some(MembershipRow {
                    email: email.clone(),
                    cluster_id: id,
                    role: self.role,
                    email_label: self.email_labels.get(email).copied().unwrap_or(Label::Local),
                    cluster_label: cluster.label,
                    representative_name: cluster.representative_name.clone(),
                    representative_email: cluster.representative_email.clone(),
                })
            })
            .collect()
    }
}

/// Label every cluster of `clusters` using per-email `classification`.
///
/// A cluster is `Org` when any member is `Org`. Otherwise it takes the
/// majority member label; ties go to the label of the most recently used
/// member among the tied labels. The representative is the name/email of
/// the latest commit, earliest record winning ties.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use orgpulse_core::{Allowlists, CommitRecord, Label, Role};
/// use orgpulse_identity::classify::{classify_emails, DomainClassifier};
/// use orgpulse_identity::graph::build_clusters;
/// use orgpulse_identity::labeler::label_clusters;
///
/// let classifier = DomainClassifier::new(Allowlists {
///     org: ["google.com".to_string()].into(),
///     personal: ["gmail.com".to_string()].into(),
///     platform_noreply: None,
/// });
/// let d1 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
/// let d2 = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();
/// let records = vec![
///     CommitRecord::new(d1, "Alice Smith", "alice@google.com", d1, "c", "c@c.org", "1"),
///     CommitRecord::new(d2, "Alice S.", "alice@gmail.com", d2, "c", "c@c.org", "2"),
///     CommitRecord::new(d2, "Alice Smith", "alice@gmail.com", d2, "c", "c@c.org", "3"),
/// ];
/// let table = build_clusters(&records, Role::Author);
/// let classes = classify_emails(&records, Role::Author, &classifier);
/// let labeled = label_clusters(&table, &classes);
///
/// let alice = &labeled.clusters[0];
/// assert_eq!(alice.label, Label::Org);
/// assert_eq!(alice.representative_email, "alice@gmail.com");
/// assert_eq!(alice.representative_name, "Alice S.");
/// ```
pub fn label_clusters(
    clusters: &ClusterTable,
    classification: &ClassificationTable,
) -> LabeledClusters {
    let role = clusters.role();

    let mut by_cluster: Vec<Vec<&NameEmailObservation>> = vec![Vec::new(); clusters.len()];
    for obs in clusters.observations() {
        if let Some(id) = clusters.cluster_of(&obs.email) {
            by_cluster[id].push(obs);
        }
    }

    let mut labeled = Vec::with_capacity(clusters.len());
    let mut membership = BTreeMap::new();
    let mut email_labels = BTreeMap::new();

    for (cluster, obs) in clusters.clusters().iter().zip(&by_cluster) {
        let member_labels: BTreeMap<&str, Label> = cluster
            .members
            .iter()
            .map(|m| (m.as_str(), classification.label_of(m)))
            .collect();

        let label = cluster_label(&member_labels, obs);
        let Some(representative) = latest(obs.iter().copied()) else {
            continue;
        };
        let first_active = obs.iter().map(|o| o.date).min().unwrap_or(representative.date);

        for (email, email_label) in &member_labels {
            membership.insert((*email).to_string(), cluster.id);
            email_labels.insert((*email).to_string(), *email_label);
        }

        labeled.push(LabeledCluster {
            cluster_id: cluster.id,
            role,
            label,
            representative_name: representative.name.clone(),
            representative_email: representative.email.clone(),
            members: cluster.members.clone(),
            commit_count: cluster.commit_count,
            first_active,
            last_active: representative.date,
        });
    }

    debug!(%role, clusters = labeled.len(), "labeled identity clusters");

    LabeledClusters {
        role,
        clusters: labeled,
        membership,
        email_labels,
    }
}

fn cluster_label(member_labels: &BTreeMap<&str, Label>, obs: &[&NameEmailObservation]) -> Label {
    if member_labels.values().any(|l| *l == Label::Org) {
        return Label::Org;
    }

    let mut counts: BTreeMap<Label, usize> = BTreeMap::new();
    for label in member_labels.values() {
        *counts.entry(*label).or_default() += 1;
    }
    let Some(&top) = counts.values().max() else {
        return Label::Local;
    };
    let tied: BTreeSet<Label> = counts
        .into_iter()
        .filter(|(_, n)| *n == top)
        .map(|(label, _)| label)
        .collect();

    if tied.len() > 1 {
        let recent = latest(obs.iter().copied().filter(|o| {
            member_labels
                .get(o.email.as_str())
                .is_some_and(|l| tied.contains(l))
        }));
        if let Some(label) = recent.and_then(|o| member_labels.get(o.email.as_str())) {
            return *label;
        }
    }

    tied.into_iter().next().unwrap_or(Label::Local)
}

/// Latest observation by date; among equal dates the earliest record wins.
fn latest<'a>(
    obs: impl Iterator<Item = &'a NameEmailObservation>,
) -> Option<&'a NameEmailObservation> {
    obs.fold(None::<&'a NameEmailObservation>, |best, o| match best {
        Some(b) if (b.date, std::cmp::Reverse(b.record_index))
            >= (o.date, std::cmp::Reverse(o.record_index)) =>
        {
            Some(b)
        }
        _ => Some(o),
    })
}
