//! Structured run report: what was processed, upserted, skipped and left
//! unresolved, per entity type.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{error, warn};

use crate::error::{GatewayError, NormalizeError, RecordError, ResolveError};
use crate::model::UpsertCount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Teams,
    Leagues,
    Staff,
    Players,
    Rankings,
    Matches,
}

/// Per-record state machine. A skipped record is tagged with the state it
/// failed to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetched,
    Normalized,
    Resolved,
    Persisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Malformed,
    DateFormat,
    UnknownNationality,
    UnknownPosition,
    NoMatchFound,
    AmbiguousMatch,
    /// API team on the exclusion list.
    Excluded,
    /// Document patch rejected by the document store.
    PatchFailed,
}

impl SkipReason {
    pub fn of(err: &RecordError) -> Self {
        match err {
            RecordError::Malformed(_) => SkipReason::Malformed,
            RecordError::Normalize(NormalizeError::DateFormat(_)) => SkipReason::DateFormat,
            RecordError::Normalize(NormalizeError::UnknownNationality(_)) => SkipReason::UnknownNationality,
            RecordError::Normalize(NormalizeError::UnknownPosition(_)) => SkipReason::UnknownPosition,
            RecordError::Resolve(e) => SkipReason::of_resolve(e),
        }
    }

    pub fn of_resolve(err: &ResolveError) -> Self {
        match err {
            ResolveError::NoMatchFound(_) => SkipReason::NoMatchFound,
            ResolveError::AmbiguousMatch { .. } => SkipReason::AmbiguousMatch,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            SkipReason::Malformed | SkipReason::Excluded => Stage::Fetched,
            SkipReason::DateFormat | SkipReason::UnknownNationality | SkipReason::UnknownPosition => Stage::Normalized,
            SkipReason::NoMatchFound | SkipReason::AmbiguousMatch => Stage::Resolved,
            SkipReason::PatchFailed => Stage::Persisted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub key: String,
    pub reason: SkipReason,
    pub stage: Stage,
    pub detail: String,
}

/// A foreign reference the resolver could not map to a persisted id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    pub entity: EntityKind,
    pub candidate: String,
    pub context: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EntityReport {
    /// Records that entered the pipeline, including the ones later skipped.
    pub processed: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Match documents whose team ids were backfilled.
    pub patched: usize,
    pub skipped: Vec<SkippedRecord>,
    /// Set when a gateway error aborted the batch.
    pub aborted: Option<String>,
}

impl EntityReport {
    pub fn upserted(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn record_upserts(&mut self, count: UpsertCount) {
        self.inserted += count.inserted;
        self.updated += count.updated;
    }

    pub fn skip(&mut self, key: impl Into<String>, err: &RecordError) {
        let reason = SkipReason::of(err);
        self.push_skip(key.into(), reason, err.to_string());
    }

    pub fn exclude(&mut self, key: impl Into<String>) {
        self.push_skip(key.into(), SkipReason::Excluded, "on the API exclusion list".to_string());
    }

    pub fn patch_failed(&mut self, key: impl Into<String>, detail: impl Into<String>) {
        self.push_skip(key.into(), SkipReason::PatchFailed, detail.into());
    }

    fn push_skip(&mut self, key: String, reason: SkipReason, detail: String) {
        warn!("Skipped {} ({:?}): {}", key, reason, detail);
        self.skipped.push(SkippedRecord {
            key,
            reason,
            stage: reason.stage(),
            detail,
        });
    }

    pub fn abort(&mut self, kind: EntityKind, err: &GatewayError) {
        error!("{:?} batch aborted: {}", kind, err);
        self.aborted = Some(err.to_string());
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub entities: BTreeMap<EntityKind, EntityReport>,
    pub unresolved: Vec<UnresolvedReference>,
}

/// Counts only, for logs and the health endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub upserted: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    pub unresolved: usize,
    pub aborted: Vec<EntityKind>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::start()
    }
}

impl RunReport {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            entities: BTreeMap::new(),
            unresolved: Vec::new(),
        }
    }

    pub fn entity(&mut self, kind: EntityKind) -> &mut EntityReport {
        self.entities.entry(kind).or_default()
    }

    pub fn get(&self, kind: EntityKind) -> Option<&EntityReport> {
        self.entities.get(&kind)
    }

    pub fn unresolved(&mut self, entity: EntityKind, candidate: &str, context: impl Into<String>, err: &ResolveError) {
        self.unresolved.push(UnresolvedReference {
            entity,
            candidate: candidate.to_string(),
            context: context.into(),
            reason: SkipReason::of_resolve(err),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            unresolved: self.unresolved.len(),
            ..RunSummary::default()
        };
        for (kind, entity) in &self.entities {
            summary.processed += entity.processed;
            summary.upserted += entity.upserted();
            for skipped in &entity.skipped {
                *summary.skipped.entry(skipped.reason).or_default() += 1;
            }
            if entity.aborted.is_some() {
                summary.aborted.push(*kind);
            }
        }
        summary
    }

    /// Nothing skipped, unresolved or aborted.
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
            && self
                .entities
                .values()
                .all(|e| e.skipped.is_empty() && e.aborted.is_none())
    }
}
