//! Email domain classification.
//!
//! Splits an email at its last `@`, decomposes the host into registered
//! domain and public suffix, and evaluates [`LABEL_PRECEDENCE`] top to bottom.
//! Classification is a pure, total function of `(role, host)`.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use orgpulse_core::{Allowlists, ClassifyConfig, CommitRecord, Label, OrgpulseError, Role};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

/// Classification of a single email address.
///
/// # Examples
///
/// ```
/// use orgpulse_core::{Allowlists, Label, Role};
/// use orgpulse_identity::classify::DomainClassifier;
///
/// let classifier = DomainClassifier::new(Allowlists::default());
/// let identity = classifier.classify("ada@student.ox.ac.uk", Role::Author);
/// assert_eq!(identity.registered_domain.as_deref(), Some("ox.ac.uk"));
/// assert_eq!(identity.suffix.as_deref(), Some("ac.uk"));
/// assert_eq!(identity.label, Label::Edu);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailIdentity {
    /// The (lower-cased) email address.
    pub email: String,
    /// Role the email was observed in.
    pub role: Role,
    /// Registered domain (`label.suffix`), `None` when there is no usable host.
    pub registered_domain: Option<String>,
    /// Public suffix of the host.
    pub suffix: Option<String>,
    /// Assigned category.
    pub label: Label,
}

/// Boolean facts about a host that the label rules are evaluated against.
///
/// # Examples
///
/// ```
/// use orgpulse_identity::classify::{DomainFacts, LabelRule, LABEL_PRECEDENCE};
///
/// let facts = DomainFacts { has_domain: true, is_org: false, is_personal_hosted: true, is_edu: true };
/// let first = LABEL_PRECEDENCE.iter().find(|rule| rule.matches(&facts)).unwrap();
/// assert_eq!(*first, LabelRule::PersonalHost);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainFacts {
    /// A registered domain could be extracted.
    pub has_domain: bool,
    /// Organization-owned domain, or the platform no-reply domain in committer role.
    pub is_org: bool,
    /// Personal email hosting provider.
    pub is_personal_hosted: bool,
    /// Academic suffix.
    pub is_edu: bool,
}

/// One step of the label precedence list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelRule {
    /// No registered domain.
    NoDomain,
    /// Organization-owned domain.
    OrgDomain,
    /// Personal hosting provider.
    PersonalHost,
    /// Academic suffix.
    Education,
    /// Anything else.
    Fallback,
}

/// Label rules in precedence order; the first matching rule wins.
pub const LABEL_PRECEDENCE: &[LabelRule] = &[
    LabelRule::NoDomain,
    LabelRule::OrgDomain,
    LabelRule::PersonalHost,
    LabelRule::Education,
    LabelRule::Fallback,
];

impl LabelRule {
    /// Whether this rule applies to `facts`.
    pub fn matches(self, facts: &DomainFacts) -> bool {
        match self {
            LabelRule::NoDomain => !facts.has_domain,
            LabelRule::OrgDomain => facts.is_org,
            LabelRule::PersonalHost => facts.is_personal_hosted,
            LabelRule::Education => facts.is_edu,
            LabelRule::Fallback => true,
        }
    }

    /// Label assigned when this rule matches.
    pub fn label(self) -> Label {
        match self {
            LabelRule::NoDomain => Label::Local,
            LabelRule::OrgDomain => Label::Org,
            LabelRule::PersonalHost => Label::Personal,
            LabelRule::Education => Label::Edu,
            LabelRule::Fallback => Label::Other,
        }
    }
}

/// Evaluate [`LABEL_PRECEDENCE`] against `facts`.
pub fn resolve_label(facts: &DomainFacts) -> Label {
    LABEL_PRECEDENCE
        .iter()
        .find(|rule| rule.matches(facts))
        .map_or(Label::Other, |rule| rule.label())
}

/// Classifier holding the configured allowlists.
#[derive(Debug, Clone, Default)]
pub struct DomainClassifier {
    lists: Allowlists,
}

impl DomainClassifier {
    /// Create a classifier from validated allowlists.
    pub fn new(lists: Allowlists) -> Self {
        Self { lists }
    }

    /// Create a classifier from the `[classify]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`OrgpulseError::Config`] when an allowlist is missing.
    pub fn from_config(config: &ClassifyConfig) -> Result<Self, OrgpulseError> {
        Ok(Self::new(config.allowlists()?))
    }

    /// Classify one email address observed in `role`.
    ///
    /// # Examples
    ///
    /// ```
    /// use orgpulse_core::{Allowlists, Label, Role};
    /// use orgpulse_identity::classify::DomainClassifier;
    ///
    /// let classifier = DomainClassifier::default();
    /// let identity = classifier.classify("root", Role::Committer);
    /// assert!(identity.registered_domain.is_none());
    /// assert_eq!(identity.label, Label::Local);
    /// ```
    pub fn classify(&self, email: &str, role: Role) -> EmailIdentity {
        let email = orgpulse_core::normalize_email(email);
        let host = email
            .rsplit_once('@')
            .map(|(_, host)| host.trim().trim_end_matches('.'))
            .filter(|host| !host.is_empty());

        let (registered_domain, suffix) = match host {
            Some(host) => decompose_host(host),
            None => (None, None),
        };

        let facts = self.facts(role, host, registered_domain.as_deref(), suffix.as_deref());

        EmailIdentity {
            role,
            registered_domain,
            suffix,
            label: resolve_label(&facts),
            email,
        }
    }

    fn facts(
        &self,
        role: Role,
        host: Option<&str>,
        registered_domain: Option<&str>,
        suffix: Option<&str>,
    ) -> DomainFacts {
        let Some(domain) = registered_domain else {
            return DomainFacts::default();
        };

        let listed = |list: &BTreeSet<String>| {
            list.contains(domain) || host.is_some_and(|h| list.contains(h))
        };
        let is_platform = role == Role::Committer
            && self
                .lists
                .platform_noreply
                .as_deref()
                .is_some_and(|p| p == domain || host == Some(p));

        DomainFacts {
            has_domain: true,
            is_org: listed(&self.lists.org) || is_platform,
            is_personal_hosted: listed(&self.lists.personal),
            is_edu: suffix.is_some_and(is_edu_suffix),
        }
    }
}

/// Split a host into registered domain and public suffix.
///
/// IP literals, single-label hosts and malformed hosts (empty labels, or
/// characters outside letters, digits, `-` and `_`) have no registered
/// domain. Only ICANN suffixes count: a private-section entry such as
/// `github.io` is a registered domain, not a suffix.
///
/// # Examples
///
/// ```
/// use orgpulse_identity::classify::decompose_host;
///
/// let (domain, suffix) = decompose_host("mail.google.com");
/// assert_eq!(domain.as_deref(), Some("google.com"));
/// assert_eq!(suffix.as_deref(), Some("com"));
///
/// assert_eq!(decompose_host("localhost").0, None);
/// assert_eq!(decompose_host("a..com"), (None, None));
/// assert_eq!(decompose_host("foo.github.io").0.as_deref(), Some("github.io"));
/// ```
pub fn decompose_host(host: &str) -> (Option<String>, Option<String>) {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.parse::<IpAddr>().is_ok() || !is_valid_host(host) {
        return (None, None);
    }

    let Some(suffix) = icann_suffix(host) else {
        return (None, None);
    };
    let domain = host[..host.len() - suffix.len()]
        .strip_suffix('.')
        .and_then(|rest| rest.rsplit('.').next())
        .map(|label| format!("{label}.{suffix}"));
    (domain, Some(suffix.to_string()))
}

fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host.split('.').all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
        })
}

/// Longest ICANN suffix of `host`; private-section matches are skipped.
fn icann_suffix(host: &str) -> Option<&str> {
    let mut candidate = host;
    loop {
        let suffix = psl::suffix(candidate.as_bytes())?;
        let len = suffix.as_bytes().len();
        let found = &candidate[candidate.len() - len..];
        if suffix.typ() != Some(psl::Type::Private) {
            return Some(found);
        }
        candidate = found.split_once('.')?.1;
    }
}

fn is_edu_suffix(suffix: &str) -> bool {
    suffix.contains("edu") || suffix.contains("ac.")
}

/// Classification of every distinct email observed in one role.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationTable {
    /// Role the table was built for.
    pub role: Role,
    entries: BTreeMap<String, EmailIdentity>,
}

impl ClassificationTable {
    /// Look up the classification of `email`.
    pub fn get(&self, email: &str) -> Option<&EmailIdentity> {
        self.entries.get(email)
    }

    /// Label of `email`, `Local` when it was never classified.
    pub fn label_of(&self, email: &str) -> Label {
        self.get(email).map_or(Label::Local, |e| e.label)
    }

    /// All classifications, ordered by email.
    pub fn iter(&self) -> impl Iterator<Item = &EmailIdentity> {
        self.entries.values()
    }

    /// Number of classified emails.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Classify every distinct email used in `role` across `records`.
///
/// Distinct emails are classified in parallel; the ordered result is
/// identical to a sequential pass.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use orgpulse_core::{Allowlists, CommitRecord, Label, Role};
/// use orgpulse_identity::classify::{classify_emails, DomainClassifier};
///
/// let d = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
/// let records = vec![CommitRecord::new(d, "A", "a@uni.edu", d, "A", "a@uni.edu", "1")];
/// let table = classify_emails(&records, Role::Author, &DomainClassifier::new(Allowlists::default()));
/// assert_eq!(table.label_of("a@uni.edu"), Label::Edu);
/// ```
pub fn classify_emails(
    records: &[CommitRecord],
    role: Role,
    classifier: &DomainClassifier,
) -> ClassificationTable {
    let distinct: BTreeSet<&str> = records.iter().map(|r| r.email(role)).collect();

    let entries: BTreeMap<String, EmailIdentity> = distinct
        .into_par_iter()
        .map(|email| (email.to_string(), classifier.classify(email, role)))
        .collect();

    debug!(%role, emails = entries.len(), "classified emails");
    ClassificationTable { role, entries }
}
