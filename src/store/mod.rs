//! Persistence gateways.
//!
//! The pipeline only talks to these two traits: a relational store for
//! Team/Player/Staff/League/Ranking and a document store for match
//! documents. Every relational upsert batch runs in one transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::model::{League, LeagueId, LeagueName, MatchDocument, Player, Ranking, Staff, Team, TeamId, UpsertCount};

pub mod memory;
pub mod postgres;
pub mod redis_docs;

pub use memory::{MemoryDocumentStore, MemoryRelationalStore};
pub use postgres::PostgresStore;
pub use redis_docs::RedisDocumentStore;

#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Team whose short name equals `key` (already case-normalized).
    async fn find_team_exact(&self, key: &str) -> Result<Option<(TeamId, String)>, GatewayError>;

    /// Teams whose short name contains `key` or is contained in it, in id order.
    async fn find_teams_containing(&self, key: &str) -> Result<Vec<(TeamId, String)>, GatewayError>;

    async fn find_league(&self, name: LeagueName, season: i32) -> Result<Option<LeagueId>, GatewayError>;

    /// Keyed by short name.
    async fn upsert_teams(&self, teams: &[Team]) -> Result<UpsertCount, GatewayError>;

    /// Keyed by (name, season).
    async fn upsert_leagues(&self, leagues: &[League]) -> Result<UpsertCount, GatewayError>;

    /// Keyed by (first name, last name, role, team).
    async fn upsert_staff(&self, staff: &[Staff]) -> Result<UpsertCount, GatewayError>;

    /// Keyed by (first name, last name, birth date, team).
    async fn upsert_players(&self, players: &[Player]) -> Result<UpsertCount, GatewayError>;

    /// Keyed by (team, league, type).
    async fn upsert_rankings(&self, rankings: &[Ranking]) -> Result<UpsertCount, GatewayError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub document: MatchDocument,
}

/// Equality filter over the top-level match document fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchFilter {
    pub league: Option<String>,
    pub season: Option<String>,
    pub matchday: Option<u32>,
}

impl MatchFilter {
    pub fn by_key(league: &str, season: &str, matchday: u32) -> Self {
        Self {
            league: Some(league.to_string()),
            season: Some(season.to_string()),
            matchday: Some(matchday),
        }
    }

    pub fn is_full_key(&self) -> bool {
        self.league.is_some() && self.season.is_some() && self.matchday.is_some()
    }

    pub fn matches(&self, doc: &MatchDocument) -> bool {
        self.league.as_ref().map_or(true, |l| *l == doc.league)
            && self.season.as_ref().map_or(true, |s| *s == doc.season)
            && self.matchday.map_or(true, |m| m == doc.matchday)
    }
}

/// `$set`-style update: dotted paths with numeric array indices,
/// e.g. `matches.3.home_team.id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    pub set: Vec<(String, Value)>,
}

impl DocumentUpdate {
    pub fn set(mut self, path: impl Into<String>, value: Value) -> Self {
        self.set.push((path.into(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts all documents; returned ids are in input order.
    async fn insert_many(&self, docs: &[MatchDocument]) -> Result<Vec<DocumentId>, GatewayError>;

    /// Documents matching `filter` in insertion order.
    async fn find(&self, filter: &MatchFilter, limit: Option<usize>) -> Result<Vec<StoredDocument>, GatewayError>;

    /// Applies `update` to one document. `Ok(false)` when the id is unknown.
    async fn update_one(&self, id: DocumentId, update: &DocumentUpdate) -> Result<bool, GatewayError>;
}

/// Both gateways, shared by the pipeline and the service.
#[derive(Clone)]
pub struct Gateways {
    pub relational: Arc<dyn RelationalStore>,
    pub documents: Arc<dyn DocumentStore>,
}

impl Gateways {
    pub fn in_memory() -> (Self, Arc<MemoryRelationalStore>, Arc<MemoryDocumentStore>) {
        let relational = Arc::new(MemoryRelationalStore::new());
        let documents = Arc::new(MemoryDocumentStore::new());
        let gateways = Self {
            relational: relational.clone(),
            documents: documents.clone(),
        };
        (gateways, relational, documents)
    }
}

/// Apply a `DocumentUpdate` to a JSON document in place.
///
/// Missing object keys are created; array indices must already exist.
pub fn apply_update(doc: &mut Value, update: &DocumentUpdate) -> Result<(), GatewayError> {
    for (path, value) in &update.set {
        set_path(doc, path, value.clone())?;
    }
    Ok(())
}

fn set_path(doc: &mut Value, path: &str, value: Value) -> Result<(), GatewayError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(GatewayError::Other(format!("invalid update path '{}'", path)));
    }

    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| GatewayError::Other("empty update path".to_string()))?;

    let mut cursor = doc;
    for segment in parents {
        cursor = step_mut(cursor, segment, path)?;
    }

    match cursor {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            let slot = last
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get_mut(i))
                .ok_or_else(|| GatewayError::Other(format!("index '{}' out of range in '{}'", last, path)))?;
            *slot = value;
            Ok(())
        }
        _ => Err(GatewayError::Other(format!("cannot set '{}' on a scalar", path))),
    }
}

fn step_mut<'a>(cursor: &'a mut Value, segment: &str, path: &str) -> Result<&'a mut Value, GatewayError> {
    match cursor {
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Default::default()))),
        Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(move |i| items.get_mut(i))
            .ok_or_else(|| GatewayError::Other(format!("index '{}' out of range in '{}'", segment, path))),
        _ => Err(GatewayError::Other(format!("cannot descend into scalar at '{}' in '{}'", segment, path))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sets_nested_array_paths() {
        let mut doc = json!({
            "league": "Ligue 1",
            "matches": [
                {"home_team": {"id": null, "name": "Lens"}},
                {"home_team": {"id": null, "name": "Lyon"}}
            ]
        });
        let update = DocumentUpdate::default()
            .set("matches.1.home_team.id", json!(7))
            .set("matches.0.away_team", json!({"id": 3, "name": "Brest"}));
        apply_update(&mut doc, &update).unwrap();

        assert_eq!(doc["matches"][1]["home_team"]["id"], 7);
        assert_eq!(doc["matches"][1]["home_team"]["name"], "Lyon");
        assert_eq!(doc["matches"][0]["away_team"]["id"], 3);
    }

    #[test]
    fn rejects_out_of_range_and_scalar_paths() {
        let mut doc = json!({"league": "Ligue 2", "matches": []});
        let out_of_range = DocumentUpdate::default().set("matches.0.score", json!(null));
        assert!(apply_update(&mut doc, &out_of_range).is_err());

        let scalar = DocumentUpdate::default().set("league.name", json!("x"));
        assert!(apply_update(&mut doc, &scalar).is_err());

        let empty_segment = DocumentUpdate::default().set("matches..id", json!(1));
        assert!(apply_update(&mut doc, &empty_segment).is_err());
    }

    #[test]
    fn filter_matches_partial_keys() {
        let doc = MatchDocument {
            league: "Ligue 2".into(),
            season: "2023-2024".into(),
            matchday: 4,
            matches: vec![],
        };
        assert!(MatchFilter::default().matches(&doc));
        assert!(MatchFilter::by_key("Ligue 2", "2023-2024", 4).matches(&doc));
        let other_day = MatchFilter { matchday: Some(5), ..Default::default() };
        assert!(!other_day.matches(&doc));
    }
}
