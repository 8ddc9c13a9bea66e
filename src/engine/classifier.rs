//! Status classification.
//!
//! Maps an intent, a transport status code and an optional remote status
//! value to one of four outcome classes. Terminal status values are data,
//! supplied per resource type from configuration.

use std::collections::{HashMap, HashSet};

use crate::config::{ResourceTypeConfig, StatusSets};
use crate::control_plane::{Intent, is_absent_status, is_success_status};

/// Outcome class of a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The object reached its stable state.
    Succeeded,
    /// The object does not exist (any more).
    AlreadyAbsent,
    /// Not terminal yet; keep polling.
    StillPending,
    /// The control plane reported a terminal failure.
    RemoteFailure,
}

/// Terminal status values of one resource type.
///
/// An empty success set means the object has no lifecycle status and is
/// ready as soon as it can be fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusTable {
    success: HashSet<String>,
    failure: HashSet<String>,
    absent: HashSet<String>,
}

/// Per-kind lookup of status tables.
#[derive(Debug, Clone, Default)]
pub struct StatusClassifier {
    tables: HashMap<String, StatusTable>,
    fallback: StatusTable,
}

impl StatusTable {
    /// Creates a table from string slices.
    #[must_use]
    pub fn new(success: &[&str], failure: &[&str], absent: &[&str]) -> Self {
        Self::from_sets(&StatusSets::new(success, failure, absent))
    }

    /// Creates a table from configured status sets.
    #[must_use]
    pub fn from_sets(sets: &StatusSets) -> Self {
        let owned = |values: &[String]| values.iter().cloned().collect();
        Self {
            success: owned(&sets.success),
            failure: owned(&sets.failure),
            absent: owned(&sets.absent),
        }
    }

    fn is_success(&self, remote: Option<&str>) -> bool {
        self.success.is_empty() || remote.is_some_and(|r| self.success.contains(r))
    }

    fn is_failure(&self, remote: Option<&str>) -> bool {
        remote.is_some_and(|r| self.failure.contains(r))
    }

    fn is_absent(&self, remote: Option<&str>) -> bool {
        remote.is_some_and(|r| self.absent.contains(r))
    }

    /// Classifies one observation.
    #[must_use]
    pub fn classify(&self, intent: Intent, status: u16, remote: Option<&str>) -> Classification {
        if is_absent_status(status) {
            return match intent {
                Intent::Delete | Intent::Read => Classification::AlreadyAbsent,
                // A freshly created object may not be visible yet.
                Intent::Create => Classification::StillPending,
                Intent::Update => Classification::RemoteFailure,
            };
        }

        if is_success_status(status) {
            return self.classify_existing(intent, remote);
        }

        if status == 408 || status == 429 || status >= 500 {
            Classification::StillPending
        } else {
            Classification::RemoteFailure
        }
    }

    fn classify_existing(&self, intent: Intent, remote: Option<&str>) -> Classification {
        match intent {
            Intent::Read if self.is_absent(remote) => Classification::AlreadyAbsent,
            Intent::Read => Classification::Succeeded,
            Intent::Delete if self.is_absent(remote) => Classification::AlreadyAbsent,
            _ if self.is_failure(remote) || self.is_absent(remote) => {
                Classification::RemoteFailure
            }
            Intent::Delete => Classification::StillPending,
            Intent::Create | Intent::Update if self.is_success(remote) => {
                Classification::Succeeded
            }
            Intent::Create | Intent::Update => Classification::StillPending,
        }
    }
}

impl StatusClassifier {
    /// Creates a classifier from configured resource types.
    #[must_use]
    pub fn from_types(types: &[ResourceTypeConfig]) -> Self {
        let tables = types
            .iter()
            .map(|t| (t.kind.clone(), StatusTable::from_sets(&t.statuses)))
            .collect();

        Self {
            tables,
            fallback: StatusTable::default(),
        }
    }

    /// Registers or replaces the table of a kind.
    #[must_use]
    pub fn with_table(mut self, kind: impl Into<String>, table: StatusTable) -> Self {
        self.tables.insert(kind.into(), table);
        self
    }

    /// Returns the table of a kind; unknown kinds get an empty table.
    #[must_use]
    pub fn table(&self, kind: &str) -> &StatusTable {
        self.tables.get(kind).unwrap_or(&self.fallback)
    }

    /// Classifies one observation for a kind.
    #[must_use]
    pub fn classify(
        &self,
        kind: &str,
        intent: Intent,
        status: u16,
        remote: Option<&str>,
    ) -> Classification {
        self.table(kind).classify(intent, status, remote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Classification::{AlreadyAbsent, RemoteFailure, StillPending, Succeeded};

    fn lb_table() -> StatusTable {
        StatusTable::new(&["ACTIVE"], &["ERROR"], &["DELETED"])
    }

    #[test]
    fn test_delete_absent_codes() {
        let table = lb_table();
        assert_eq!(table.classify(Intent::Delete, 404, None), AlreadyAbsent);
        assert_eq!(table.classify(Intent::Delete, 410, None), AlreadyAbsent);
        assert_eq!(table.classify(Intent::Delete, 200, Some("DELETING")), StillPending);
        assert_eq!(table.classify(Intent::Delete, 200, Some("DELETED")), AlreadyAbsent);
        assert_eq!(table.classify(Intent::Delete, 200, Some("ERROR")), RemoteFailure);
    }

    #[test]
    fn test_read_absent_codes() {
        let table = lb_table();
        assert_eq!(table.classify(Intent::Read, 404, None), AlreadyAbsent);
        assert_eq!(table.classify(Intent::Read, 410, None), AlreadyAbsent);
        assert_eq!(table.classify(Intent::Read, 200, Some("creating")), Succeeded);
        assert_eq!(table.classify(Intent::Read, 200, Some("ERROR")), Succeeded);
        assert_eq!(table.classify(Intent::Read, 200, Some("DELETED")), AlreadyAbsent);
    }

    #[test]
    fn test_create_and_update_terminal_values() {
        let table = lb_table();
        assert_eq!(table.classify(Intent::Create, 200, Some("ACTIVE")), Succeeded);
        assert_eq!(table.classify(Intent::Create, 200, Some("creating")), StillPending);
        assert_eq!(table.classify(Intent::Create, 200, Some("ERROR")), RemoteFailure);
        assert_eq!(table.classify(Intent::Create, 200, None), StillPending);
        assert_eq!(table.classify(Intent::Create, 404, None), StillPending);
        assert_eq!(table.classify(Intent::Update, 404, None), RemoteFailure);
        assert_eq!(table.classify(Intent::Update, 200, Some("ACTIVE")), Succeeded);
    }

    #[test]
    fn test_transient_and_fatal_codes() {
        let table = lb_table();
        for status in [408, 429, 500, 502, 503] {
            assert_eq!(table.classify(Intent::Create, status, None), StillPending);
            assert_eq!(table.classify(Intent::Read, status, None), StillPending);
        }
        for status in [400, 401, 403, 409, 422] {
            assert_eq!(table.classify(Intent::Update, status, None), RemoteFailure);
        }
    }

    #[test]
    fn test_empty_success_set_means_existence_is_terminal() {
        let classifier = StatusClassifier::default();
        assert_eq!(classifier.classify("token", Intent::Create, 200, None), Succeeded);
        assert_eq!(classifier.classify("token", Intent::Update, 201, Some("whatever")), Succeeded);
    }

    #[test]
    fn test_classifier_looks_up_tables_by_kind() {
        let mut lb = ResourceTypeConfig::new("load_balancer", "lbs");
        lb.statuses = StatusSets::new(&["ACTIVE"], &["ERROR"], &[]);
        let classifier = StatusClassifier::from_types(&[lb])
            .with_table("database", StatusTable::new(&["Ready"], &[], &[]));

        assert_eq!(
            classifier.classify("load_balancer", Intent::Create, 200, Some("Ready")),
            StillPending
        );
        assert_eq!(
            classifier.classify("database", Intent::Create, 200, Some("Ready")),
            Succeeded
        );
    }
}
