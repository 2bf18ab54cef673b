//! First-activity age per registered domain.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use orgpulse_core::{CommitRecord, Label, Role};
use orgpulse_identity::classify::ClassificationTable;
use serde::Serialize;
use tracing::debug;

/// How long a registered domain has been active as of a cutoff date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainAge {
    /// Registered domain.
    pub domain: String,
    /// Role the domain was observed in.
    pub role: Role,
    /// Label of the domain's earliest email.
    pub label: Label,
    /// Earliest commit date seen for the domain.
    pub first_date: NaiveDate,
    /// Commits attributed to the domain.
    pub commit_count: usize,
    /// Whole days from `first_date` to the cutoff; negative when the domain
    /// first appears after it.
    pub age_days: i64,
}

struct Earliest<'a> {
    date: NaiveDate,
    email: &'a str,
    commits: usize,
}

/// Compute the first-activity age of every registered domain in the role of
/// `table`, measured against the fixed `cutoff`.
///
/// Emails without a registered domain are skipped. Rows are ordered by first
/// date, then domain. When two emails of a domain share the earliest date,
/// the lexicographically smaller one supplies the label.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use orgpulse_core::{Allowlists, CommitRecord, Role};
/// use orgpulse_identity::classify::{classify_emails, DomainClassifier};
/// use orgpulse_activity::age::first_activity_ages;
///
/// let d = NaiveDate::from_ymd_opt(2023, 12, 1).unwrap();
/// let records = vec![CommitRecord::new(d, "A", "a@uni.edu", d, "A", "a@uni.edu", "1")];
/// let table = classify_emails(&records, Role::Author, &DomainClassifier::default());
/// let cutoff = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
///
/// let ages = first_activity_ages(&records, &table, cutoff);
/// assert_eq!(ages[0].domain, "uni.edu");
/// assert_eq!(ages[0].age_days, 31);
/// ```
pub fn first_activity_ages(
    records: &[CommitRecord],
    table: &ClassificationTable,
    cutoff: NaiveDate,
) -> Vec<DomainAge> {
    let role = table.role;
    let mut domains: BTreeMap<&str, Earliest<'_>> = BTreeMap::new();

    for record in records {
        let email = record.email(role);
        let Some(domain) = table.get(email).and_then(|e| e.registered_domain.as_deref()) else {
            continue;
        };
        let date = record.date(role);

        let entry = domains.entry(domain).or_insert(Earliest {
            date,
            email,
            commits: 0,
        });
        entry.commits += 1;
        if (date, email) < (entry.date, entry.email) {
            entry.date = date;
            entry.email = email;
        }
    }

    let mut ages = domains
        .into_iter()
        .map(|(domain, earliest)| DomainAge {
            domain: domain.to_string(),
            role,
            label: table.label_of(earliest.email),
            first_date: earliest.date,
            commit_count: earliest.commits,
            age_days: (cutoff - earliest.date).num_days(),
        })
        .collect::<Vec<_>>();
    ages.sort_by(|a, b| (a.first_date, &a.domain).cmp(&(b.first_date, &b.domain)));

    debug!(%role, %cutoff, domains = ages.len(), "computed first-activity ages");
    ages
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgpulse_core::Allowlists;
    use orgpulse_identity::classify::{classify_emails, DomainClassifier};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn commit(author: (NaiveDate, &str), committer: (NaiveDate, &str)) -> CommitRecord {
        CommitRecord::new(author.0, "A", author.1, committer.0, "C", committer.1, "h")
    }

    fn table(records: &[CommitRecord], role: Role) -> ClassificationTable {
        let classifier = DomainClassifier::new(Allowlists {
            personal: ["gmail.com".to_string()].into(),
            org: ["acme.com".to_string()].into(),
            platform_noreply: None,
        });
        classify_emails(records, role, &classifier)
    }

    #[test]
    fn earliest_date_across_hosts_of_one_domain() {
        let records = vec![
            commit((day(2022, 5, 1), "a@eng.acme.com"), (day(2022, 5, 1), "x@gmail.com")),
            commit((day(2021, 3, 1), "b@acme.com"), (day(2021, 3, 2), "x@gmail.com")),
            commit((day(2023, 1, 1), "c@gmail.com"), (day(2023, 1, 1), "x@gmail.com")),
        ];
        let ages = first_activity_ages(&records, &table(&records, Role::Author), day(2024, 1, 1));

        assert_eq!(ages.len(), 2);
        assert_eq!(ages[0].domain, "acme.com");
        assert_eq!(ages[0].label, Label::Org);
        assert_eq!(ages[0].first_date, day(2021, 3, 1));
        assert_eq!(ages[0].commit_count, 2);
        assert_eq!(ages[0].age_days, 1036);
        assert_eq!(ages[1].domain, "gmail.com");
        assert_eq!(ages[1].age_days, 365);
    }

    #[test]
    fn roles_use_their_own_dates() {
        let records = vec![commit(
            (day(2020, 1, 1), "a@gmail.com"),
            (day(2020, 1, 11), "a@gmail.com"),
        )];
        let cutoff = day(2020, 1, 21);
        let author = first_activity_ages(&records, &table(&records, Role::Author), cutoff);
        let committer = first_activity_ages(&records, &table(&records, Role::Committer), cutoff);
        assert_eq!(author[0].age_days, 20);
        assert_eq!(author[0].role, Role::Author);
        assert_eq!(committer[0].age_days, 10);
    }

    #[test]
    fn activity_after_cutoff_is_negative() {
        let records = vec![commit((day(2024, 1, 10), "a@x.org"), (day(2024, 1, 10), "a@x.org"))];
        let ages = first_activity_ages(&records, &table(&records, Role::Author), day(2024, 1, 1));
        assert_eq!(ages[0].age_days, -9);
        assert_eq!(ages[0].label, Label::Other);
    }

    #[test]
    fn emails_without_domain_are_skipped() {
        let records = vec![
            commit((day(2020, 1, 1), "root"), (day(2020, 1, 1), "root")),
            commit((day(2020, 1, 1), "me@localhost"), (day(2020, 1, 1), "me@localhost")),
            commit((day(2020, 1, 1), ""), (day(2020, 1, 1), "")),
        ];
        let ages = first_activity_ages(&records, &table(&records, Role::Author), day(2024, 1, 1));
        assert!(ages.is_empty());
    }

    #[test]
    fn ties_on_first_date_order_by_domain() {
        let records = vec![
            commit((day(2020, 1, 1), "z@zeta.org"), (day(2020, 1, 1), "z@zeta.org")),
            commit((day(2020, 1, 1), "a@alpha.org"), (day(2020, 1, 1), "a@alpha.org")),
        ];
        let ages = first_activity_ages(&records, &table(&records, Role::Author), day(2020, 1, 2));
        let domains: Vec<&str> = ages.iter().map(|a| a.domain.as_str()).collect();
        assert_eq!(domains, vec!["alpha.org", "zeta.org"]);
    }

    #[test]
    fn cutoff_is_fixed_so_output_is_reproducible() {
        let records = vec![commit((day(2019, 6, 1), "a@x.org"), (day(2019, 6, 1), "a@x.org"))];
        let t = table(&records, Role::Author);
        let first = first_activity_ages(&records, &t, day(2020, 6, 1));
        let second = first_activity_ages(&records, &t, day(2020, 6, 1));
        assert_eq!(first, second);
        assert_eq!(first[0].age_days, 366);
    }
}
