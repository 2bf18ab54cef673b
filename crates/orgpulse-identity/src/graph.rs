//! Identity graph construction and clustering.
//!
//! Treats `(name, email)` pairs as a bipartite relation and merges emails
//! that are connected through shared names into identity clusters. Each
//! role is clustered on its own.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use orgpulse_core::{CommitRecord, Role};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::unionfind::UnionFind;
use serde::Serialize;
use tracing::debug;

/// A `(name, email)` pair taken from one commit in one role.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use orgpulse_core::{CommitRecord, Role};
/// use orgpulse_identity::graph::observations;
///
/// let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
/// let records = vec![CommitRecord::new(d, "Ann", "ann@x.org", d, "Bot", "bot@x.org", "1")];
/// let obs = observations(&records, Role::Committer);
/// assert_eq!(obs[0].name, "Bot");
/// assert_eq!(obs[0].record_index, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameEmailObservation {
    /// Name on the signature.
    pub name: String,
    /// Email on the signature.
    pub email: String,
    /// Role of the signature.
    pub role: Role,
    /// Date of the signature.
    pub date: NaiveDate,
    /// Position of the source record in the input.
    pub record_index: usize,
}

/// Extract one observation per record for `role`, in input order.
pub fn observations(records: &[CommitRecord], role: Role) -> Vec<NameEmailObservation> {
    records
        .iter()
        .enumerate()
        .map(|(record_index, r)| NameEmailObservation {
            name: r.name(role).to_string(),
            email: r.email(role).to_string(),
            role,
            date: r.date(role),
            record_index,
        })
        .collect()
}

/// A maximal set of emails connected through shared names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityCluster {
    /// Cluster id, numbered by ascending smallest member email.
    pub id: usize,
    /// Role the cluster was built for.
    pub role: Role,
    /// Member emails, sorted.
    pub members: Vec<String>,
    /// Distinct non-empty names used with any member, sorted.
    pub names: Vec<String>,
    /// Commits made with any member email.
    pub commit_count: usize,
}

/// All identity clusters of one role.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use orgpulse_core::{CommitRecord, Role};
/// use orgpulse_identity::graph::build_clusters;
///
/// let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
/// let records = vec![
///     CommitRecord::new(d, "Alice Smith", "alice@gmail.com", d, "x", "x@x.org", "1"),
///     CommitRecord::new(d, "Alice Smith", "alice@google.com", d, "y", "y@y.org", "2"),
/// ];
/// let table = build_clusters(&records, Role::Author);
/// assert_eq!(table.len(), 1);
/// assert_eq!(table.cluster_of("alice@gmail.com"), table.cluster_of("alice@google.com"));
/// ```
#[derive(Debug, Clone)]
pub struct ClusterTable {
    role: Role,
    clusters: Vec<IdentityCluster>,
    membership: BTreeMap<String, usize>,
    observations: Vec<NameEmailObservation>,
    edges: BTreeMap<(String, String), u32>,
}

impl ClusterTable {
    /// Role the table was built for.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Clusters ordered by id.
    pub fn clusters(&self) -> &[IdentityCluster] {
        &self.clusters
    }

    /// Cluster id of `email`, `None` for emails never observed.
    pub fn cluster_of(&self, email: &str) -> Option<usize> {
        self.membership.get(email).copied()
    }

    /// Cluster with the given id.
    pub fn get(&self, id: usize) -> Option<&IdentityCluster> {
        self.clusters.get(id)
    }

    /// Observations that contributed nodes, in input order.
    pub fn observations(&self) -> &[NameEmailObservation] {
        &self.observations
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// Whether there are no clusters.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Export the bipartite name/email graph for visualization.
    ///
    /// Nodes are every member email and every non-empty name, tagged with
    /// their cluster id. Edges are deduplicated; `weight` is the number of
    /// commits supporting the pair.
    pub fn export_graph(&self) -> GraphExport {
        let graph = self.to_graph();

        let nodes = graph
            .node_indices()
            .map(|idx| {
                let node = &graph[idx];
                ExportNode {
                    id: idx.index(),
                    label: node.label.clone(),
                    kind: node.kind,
                    cluster_id: node.cluster_id,
                }
            })
            .collect();

        let edges = graph
            .edge_indices()
            .filter_map(|e| {
                let (a, b) = graph.edge_endpoints(e)?;
                Some(ExportEdge {
                    source: a.index(),
                    target: b.index(),
                    weight: graph[e],
                })
            })
            .collect();

        GraphExport {
            role: self.role,
            nodes,
            edges,
        }
    }

    fn to_graph(&self) -> UnGraph<GraphNode, u32> {
        let mut graph = UnGraph::new_undirected();
        let mut email_nodes: BTreeMap<&str, NodeIndex> = BTreeMap::new();
        let mut name_nodes: BTreeMap<&str, NodeIndex> = BTreeMap::new();

        for (email, &cluster_id) in &self.membership {
            let idx = graph.add_node(GraphNode {
                label: email.clone(),
                kind: NodeKind::Email,
                cluster_id,
            });
            email_nodes.insert(email.as_str(), idx);
        }

        for ((name, email), &weight) in &self.edges {
            let Some(&email_idx) = email_nodes.get(email.as_str()) else {
                continue;
            };
            let name_idx = *name_nodes.entry(name.as_str()).or_insert_with(|| {
                graph.add_node(GraphNode {
                    label: name.clone(),
                    kind: NodeKind::Name,
                    cluster_id: self.membership[email],
                })
            });
            graph.add_edge(name_idx, email_idx, weight);
        }

        graph
    }
}

#[derive(Debug, Clone)]
struct GraphNode {
    label: String,
    kind: NodeKind,
    cluster_id: usize,
}

/// Kind of a node in the exported identity graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// An email address.
    Email,
    /// A display name.
    Name,
}

/// Node of the exported identity graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportNode {
    /// Node id referenced by edges.
    pub id: usize,
    /// Email address or name.
    pub label: String,
    /// Whether the node is an email or a name.
    pub kind: NodeKind,
    /// Cluster the node belongs to.
    pub cluster_id: usize,
}

/// Deduplicated name/email edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEdge {
    /// Name node id.
    pub source: usize,
    /// Email node id.
    pub target: usize,
    /// Supporting commit count (diagnostic only).
    pub weight: u32,
}

/// Node and edge lists handed to an external visualizer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphExport {
    /// Role the graph was built for.
    pub role: Role,
    /// Email nodes first, then name nodes.
    pub nodes: Vec<ExportNode>,
    /// Name/email edges.
    pub edges: Vec<ExportEdge>,
}

/// Cluster the emails observed in `role`.
///
/// Two emails share a cluster iff a chain of shared names links them.
/// Empty emails are unusable and form no node; empty names contribute no
/// edges, so their emails still form (possibly singleton) clusters. Runs in
/// time linear in the number of distinct `(name, email)` pairs.
pub fn build_clusters(records: &[CommitRecord], role: Role) -> ClusterTable {
    let observations: Vec<NameEmailObservation> = observations(records, role)
        .into_iter()
        .filter(|o| !o.email.is_empty())
        .collect();

    let mut edges: BTreeMap<(String, String), u32> = BTreeMap::new();
    let mut emails: BTreeSet<&str> = BTreeSet::new();
    for obs in &observations {
        emails.insert(obs.email.as_str());
        if !obs.name.is_empty() {
            *edges
                .entry((obs.name.clone(), obs.email.clone()))
                .or_default() += 1;
        }
    }

    // Sorted order: index 0 is the lexicographically smallest email.
    let email_index: BTreeMap<&str, usize> =
        emails.iter().enumerate().map(|(i, e)| (*e, i)).collect();

    let mut uf: UnionFind<usize> = UnionFind::new(email_index.len());
    let mut first_email_of_name: BTreeMap<&str, usize> = BTreeMap::new();
    for (name, email) in edges.keys() {
        let idx = email_index[email.as_str()];
        match first_email_of_name.get(name.as_str()) {
            Some(&anchor) => {
                uf.union(anchor, idx);
            }
            None => {
                first_email_of_name.insert(name.as_str(), idx);
            }
        }
    }

    let mut root_to_cluster: BTreeMap<usize, usize> = BTreeMap::new();
    let mut clusters: Vec<IdentityCluster> = Vec::new();
    let mut membership: BTreeMap<String, usize> = BTreeMap::new();
    for (email, &idx) in &email_index {
        let root = uf.find_mut(idx);
        let id = *root_to_cluster.entry(root).or_insert_with(|| {
            clusters.push(IdentityCluster {
                id: clusters.len(),
                role,
                members: Vec::new(),
                names: Vec::new(),
                commit_count: 0,
            });
            clusters.len() - 1
        });
        clusters[id].members.push((*email).to_string());
        membership.insert((*email).to_string(), id);
    }

    let mut names: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); clusters.len()];
    for (name, email) in edges.keys() {
        names[membership[email]].insert(name.as_str());
    }
    for obs in &observations {
        clusters[membership[&obs.email]].commit_count += 1;
    }
    for (cluster, names) in clusters.iter_mut().zip(names) {
        cluster.names = names.into_iter().map(str::to_string).collect();
    }

    debug!(
        %role,
        emails = membership.len(),
        clusters = clusters.len(),
        pairs = edges.len(),
        "built identity clusters"
    );

    ClusterTable {
        role,
        clusters,
        membership,
        observations,
        edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petgraph::algo::connected_components;

    fn rec(name: &str, email: &str) -> CommitRecord {
        let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        CommitRecord::new(d, name, email, d, "committer", "c@c.org", "abc")
    }

    #[test]
    fn shared_name_merges_emails() {
        let records = vec![
            rec("Alice Smith", "alice@gmail.com"),
            rec("Alice Smith", "alice@google.com"),
            rec("Bob", "bob@example.org"),
        ];
        let table = build_clusters(&records, Role::Author);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.cluster_of("alice@gmail.com"),
            table.cluster_of("alice@google.com")
        );
        assert_ne!(
            table.cluster_of("alice@gmail.com"),
            table.cluster_of("bob@example.org")
        );
    }

    #[test]
    fn transitive_chain_through_names_and_emails() {
        // a@x --"A"-- b@x --"B"-- c@x
        let records = vec![
            rec("A", "a@x.org"),
            rec("A", "b@x.org"),
            rec("B", "b@x.org"),
            rec("B", "c@x.org"),
        ];
        let table = build_clusters(&records, Role::Author);
        assert_eq!(table.len(), 1);
        let cluster = &table.clusters()[0];
        assert_eq!(cluster.members, vec!["a@x.org", "b@x.org", "c@x.org"]);
        assert_eq!(cluster.names, vec!["A", "B"]);
        assert_eq!(cluster.commit_count, 4);
    }

    #[test]
    fn ids_follow_smallest_member_email() {
        let records = vec![rec("Z", "zed@z.org"), rec("M", "mid@m.org"), rec("Z", "aaa@z.org")];
        let table = build_clusters(&records, Role::Author);
        assert_eq!(table.cluster_of("aaa@z.org"), Some(0));
        assert_eq!(table.cluster_of("zed@z.org"), Some(0));
        assert_eq!(table.cluster_of("mid@m.org"), Some(1));

        let mut reversed = records.clone();
        reversed.reverse();
        let again = build_clusters(&reversed, Role::Author);
        assert_eq!(again.cluster_of("mid@m.org"), Some(1));
        assert_eq!(again.clusters()[0].members, table.clusters()[0].members);
    }

    #[test]
    fn email_without_at_is_a_singleton() {
        let records = vec![rec("", "no-at-sign"), rec("Someone", "s@x.org")];
        let table = build_clusters(&records, Role::Author);
        assert_eq!(table.len(), 2);
        let id = table.cluster_of("no-at-sign").unwrap();
        assert_eq!(table.get(id).unwrap().members, vec!["no-at-sign"]);
        assert!(table.get(id).unwrap().names.is_empty());
    }

    #[test]
    fn empty_email_forms_no_node() {
        let records = vec![rec("Ghost", ""), rec("Ghost", "ghost@x.org")];
        let table = build_clusters(&records, Role::Author);
        assert_eq!(table.len(), 1);
        assert_eq!(table.cluster_of(""), None);
        assert_eq!(table.observations().len(), 1);
    }

    #[test]
    fn roles_are_clustered_independently() {
        let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let records = vec![
            CommitRecord::new(d, "Sam", "sam@a.org", d, "Sam", "sam@b.org", "1"),
            CommitRecord::new(d, "Sam", "sam@c.org", d, "Other", "o@b.org", "2"),
        ];
        let authors = build_clusters(&records, Role::Author);
        let committers = build_clusters(&records, Role::Committer);
        assert_eq!(authors.len(), 1);
        assert_eq!(committers.len(), 2);
        assert_eq!(authors.cluster_of("sam@b.org"), None);
    }

    #[test]
    fn duplicate_pairs_collapse_into_weighted_edges() {
        let records = vec![rec("A", "a@x.org"), rec("A", "a@x.org"), rec("A", "a@x.org")];
        let table = build_clusters(&records, Role::Author);
        let export = table.export_graph();
        assert_eq!(export.nodes.len(), 2);
        assert_eq!(export.edges.len(), 1);
        assert_eq!(export.edges[0].weight, 3);
        assert_eq!(table.clusters()[0].commit_count, 3);
    }

    #[test]
    fn exported_graph_components_match_clusters() {
        let records = vec![
            rec("A", "a@x.org"),
            rec("A", "b@x.org"),
            rec("B", "c@x.org"),
            rec("", "lonely"),
            rec("D", "d@x.org"),
            rec("D", "c@x.org"),
        ];
        let table = build_clusters(&records, Role::Author);
        let graph = table.to_graph();
        assert_eq!(connected_components(&graph), table.len());

        let export = table.export_graph();
        let email_nodes = export
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Email)
            .count();
        assert_eq!(email_nodes, 5);
        for edge in &export.edges {
            assert_eq!(
                export.nodes[edge.source].cluster_id,
                export.nodes[edge.target].cluster_id
            );
        }
    }

    #[test]
    fn empty_input_gives_empty_table() {
        let table = build_clusters(&[], Role::Committer);
        assert!(table.is_empty());
        let export = table.export_graph();
        assert!(export.nodes.is_empty());
        assert!(export.edges.is_empty());
    }
}
