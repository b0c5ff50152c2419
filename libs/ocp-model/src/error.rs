//! Error taxonomy (spec §7) and the non-fatal audit log that rides alongside
//! each stage's output.
//!
//! Grounded on `database::common::error::DatabaseError` /
//! `domain_finops::error::FinopsError`: one `thiserror` enum per crate
//! boundary, `#[from]` for wrapped lower-level errors, fatal conditions as
//! `Err`, warning-class conditions recorded separately instead.

use std::fmt;

/// Fatal error kinds. Each variant binds to one of the exit codes in
/// spec.md §6: `Configuration` → 1, `Transient` → 2, `Corrupt` → 3,
/// `InvariantViolation` → 4.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transient infrastructure error: {0}")]
    Transient(String),

    #[error("corrupt input: {0}")]
    Corrupt(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Database(#[from] database::common::error::DatabaseError),

    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
}

impl EngineError {
    /// Process exit code per spec.md §6.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Configuration(_) => 1,
            EngineError::Transient(_) | EngineError::Database(_) => 2,
            EngineError::Corrupt(_) | EngineError::ObjectStore(_) => 3,
            EngineError::InvariantViolation(_) => 4,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// A `Warning`-class condition (spec.md §7): malformed label JSON, zero node
/// capacity, an ambiguous resource match resolved by tie-breaker, a dropped
/// corrupt row, and the like. Never fatal in the hot path — pushed here and
/// surfaced via `observability::StageMetrics` counters at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
pub enum AuditKind {
    MalformedLabelJson,
    ZeroNodeCapacity,
    AmbiguousResourceMatch,
    NonRetryableObjectError,
    CorruptRowDropped,
    ZeroRateDiskCapacity,
    UnknownNodeRole,
    UnattributedCloudRowDropped,
}

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub kind: AuditKind,
    pub detail: String,
}

impl AuditRecord {
    pub fn new(kind: AuditKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// Run-scoped accumulator for `AuditRecord`s. Each stage returns its
/// successful output alongside an `AuditLog`; the pipeline driver merges
/// logs across stages and persists them through `ocp-sink`'s `audit_events`
/// path at the end of the run.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    records: Vec<AuditRecord>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: AuditKind, detail: impl Into<String>) {
        self.records.push(AuditRecord::new(kind, detail));
    }

    pub fn extend(&mut self, other: AuditLog) {
        self.records.extend(other.records);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuditRecord> {
        self.records.iter()
    }

    pub fn count_kind(&self, kind: &AuditKind) -> usize {
        self.records.iter().filter(|r| &r.kind == kind).count()
    }

    pub fn into_records(self) -> Vec<AuditRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_spec() {
        assert_eq!(EngineError::Configuration("x".into()).exit_code(), 1);
        assert_eq!(EngineError::Transient("x".into()).exit_code(), 2);
        assert_eq!(EngineError::Corrupt("x".into()).exit_code(), 3);
        assert_eq!(EngineError::InvariantViolation("x".into()).exit_code(), 4);
    }

    #[test]
    fn audit_log_counts_by_kind() {
        let mut log = AuditLog::new();
        log.push(AuditKind::MalformedLabelJson, "pod_labels on row 4");
        log.push(AuditKind::MalformedLabelJson, "pod_labels on row 9");
        log.push(AuditKind::ZeroNodeCapacity, "node ip-10-0-0-1");

        assert_eq!(log.len(), 3);
        assert_eq!(log.count_kind(&AuditKind::MalformedLabelJson), 2);
        assert_eq!(log.count_kind(&AuditKind::ZeroNodeCapacity), 1);
    }

    #[test]
    fn audit_log_extend_merges_records() {
        let mut a = AuditLog::new();
        a.push(AuditKind::CorruptRowDropped, "a");
        let mut b = AuditLog::new();
        b.push(AuditKind::CorruptRowDropped, "b");

        a.extend(b);
        assert_eq!(a.len(), 2);
    }
}
