//! In-process gateways for dry runs and tests.
//!
//! Each upsert batch validates against a working copy and swaps it in only
//! when the whole batch succeeds, which mirrors the transactional behaviour
//! of the Postgres gateway.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{apply_update, DocumentId, DocumentStore, DocumentUpdate, MatchFilter, RelationalStore, StoredDocument};
use crate::error::GatewayError;
use crate::model::{League, LeagueId, LeagueName, MatchDocument, Player, Ranking, Staff, Team, TeamId, UpsertCount};
use crate::normalize::lookup_key;

#[derive(Debug, Clone, Default)]
struct Tables {
    next_id: i64,
    teams: Vec<(TeamId, Team)>,
    leagues: Vec<(LeagueId, League)>,
    staff: Vec<(i64, Staff)>,
    players: Vec<(i64, Player)>,
    rankings: Vec<(i64, Ranking)>,
}

impl Tables {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn has_team(&self, id: TeamId) -> bool {
        self.teams.iter().any(|(t, _)| *t == id)
    }

    fn has_league(&self, id: LeagueId) -> bool {
        self.leagues.iter().any(|(l, _)| *l == id)
    }
}

#[derive(Default)]
pub struct MemoryRelationalStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl MemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the connection dropped.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), GatewayError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Other("relational store unavailable".to_string()));
        }
        Ok(())
    }

    pub async fn teams(&self) -> Vec<(TeamId, Team)> {
        self.tables.read().await.teams.clone()
    }

    pub async fn leagues(&self) -> Vec<(LeagueId, League)> {
        self.tables.read().await.leagues.clone()
    }

    pub async fn staff(&self) -> Vec<Staff> {
        self.tables.read().await.staff.iter().map(|(_, s)| s.clone()).collect()
    }

    pub async fn players(&self) -> Vec<Player> {
        self.tables.read().await.players.iter().map(|(_, p)| p.clone()).collect()
    }

    pub async fn rankings(&self) -> Vec<Ranking> {
        self.tables.read().await.rankings.iter().map(|(_, r)| r.clone()).collect()
    }

    /// Run `apply` against a copy of the tables and commit it only on success.
    async fn transaction<F>(&self, apply: F) -> Result<UpsertCount, GatewayError>
    where
        F: FnOnce(&mut Tables) -> Result<UpsertCount, GatewayError>,
    {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let mut working = tables.clone();
        let count = apply(&mut working)?;
        *tables = working;
        Ok(count)
    }
}

#[async_trait]
impl RelationalStore for MemoryRelationalStore {
    async fn find_team_exact(&self, key: &str) -> Result<Option<(TeamId, String)>, GatewayError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .teams
            .iter()
            .find(|(_, t)| lookup_key(&t.shortname) == key)
            .map(|(id, t)| (*id, t.shortname.clone())))
    }

    async fn find_teams_containing(&self, key: &str) -> Result<Vec<(TeamId, String)>, GatewayError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .teams
            .iter()
            .filter(|(_, t)| {
                let stored = lookup_key(&t.shortname);
                !stored.is_empty() && (stored.contains(key) || key.contains(stored.as_str()))
            })
            .map(|(id, t)| (*id, t.shortname.clone()))
            .collect())
    }

    async fn find_league(&self, name: LeagueName, season: i32) -> Result<Option<LeagueId>, GatewayError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .leagues
            .iter()
            .find(|(_, l)| l.name == name && l.season == season)
            .map(|(id, _)| *id))
    }

    async fn upsert_teams(&self, teams: &[Team]) -> Result<UpsertCount, GatewayError> {
        self.transaction(|tables| {
            let mut count = UpsertCount::default();
            for team in teams {
                let key = lookup_key(&team.shortname);
                match tables.teams.iter_mut().find(|(_, t)| lookup_key(&t.shortname) == key) {
                    Some((_, existing)) => {
                        *existing = team.clone();
                        count.record(false);
                    }
                    None => {
                        let id = TeamId(tables.allocate());
                        tables.teams.push((id, team.clone()));
                        count.record(true);
                    }
                }
            }
            Ok(count)
        })
        .await
    }

    async fn upsert_leagues(&self, leagues: &[League]) -> Result<UpsertCount, GatewayError> {
        self.transaction(|tables| {
            let mut count = UpsertCount::default();
            for league in leagues {
                match tables
                    .leagues
                    .iter_mut()
                    .find(|(_, l)| l.name == league.name && l.season == league.season)
                {
                    Some((_, existing)) => {
                        *existing = league.clone();
                        count.record(false);
                    }
                    None => {
                        let id = LeagueId(tables.allocate());
                        tables.leagues.push((id, league.clone()));
                        count.record(true);
                    }
                }
            }
            Ok(count)
        })
        .await
    }

    async fn upsert_staff(&self, staff: &[Staff]) -> Result<UpsertCount, GatewayError> {
        self.transaction(|tables| {
            let mut count = UpsertCount::default();
            for member in staff {
                if !tables.has_team(member.team_id) {
                    return Err(GatewayError::Other(format!("staff references missing {}", member.team_id)));
                }
                match tables.staff.iter_mut().find(|(_, s)| {
                    s.first_name == member.first_name
                        && s.last_name == member.last_name
                        && s.role == member.role
                        && s.team_id == member.team_id
                }) {
                    Some((_, existing)) => {
                        *existing = member.clone();
                        count.record(false);
                    }
                    None => {
                        let id = tables.allocate();
                        tables.staff.push((id, member.clone()));
                        count.record(true);
                    }
                }
            }
            Ok(count)
        })
        .await
    }

    async fn upsert_players(&self, players: &[Player]) -> Result<UpsertCount, GatewayError> {
        self.transaction(|tables| {
            let mut count = UpsertCount::default();
            for player in players {
                if !tables.has_team(player.team_id) {
                    return Err(GatewayError::Other(format!("player references missing {}", player.team_id)));
                }
                match tables.players.iter_mut().find(|(_, p)| {
                    p.first_name == player.first_name
                        && p.last_name == player.last_name
                        && p.birthdate == player.birthdate
                        && p.team_id == player.team_id
                }) {
                    Some((_, existing)) => {
                        *existing = player.clone();
                        count.record(false);
                    }
                    None => {
                        let id = tables.allocate();
                        tables.players.push((id, player.clone()));
                        count.record(true);
                    }
                }
            }
            Ok(count)
        })
        .await
    }

    async fn upsert_rankings(&self, rankings: &[Ranking]) -> Result<UpsertCount, GatewayError> {
        self.transaction(|tables| {
            let mut count = UpsertCount::default();
            for ranking in rankings {
                if !tables.has_team(ranking.team_id) || !tables.has_league(ranking.league_id) {
                    return Err(GatewayError::Other(format!(
                        "ranking references missing {} or {}",
                        ranking.team_id, ranking.league_id
                    )));
                }
                match tables.rankings.iter_mut().find(|(_, r)| {
                    r.team_id == ranking.team_id && r.league_id == ranking.league_id && r.kind == ranking.kind
                }) {
                    Some((_, existing)) => {
                        *existing = ranking.clone();
                        count.record(false);
                    }
                    None => {
                        let id = tables.allocate();
                        tables.rankings.push((id, ranking.clone()));
                        count.record(true);
                    }
                }
            }
            Ok(count)
        })
        .await
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<Vec<(DocumentId, Value)>>,
    failing: RwLock<HashSet<DocumentId>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `update_one` fail for this document.
    pub async fn fail_updates_for(&self, id: DocumentId) {
        self.failing.write().await.insert(id);
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    pub async fn all(&self) -> Result<Vec<StoredDocument>, GatewayError> {
        self.find(&MatchFilter::default(), None).await
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert_many(&self, docs: &[MatchDocument]) -> Result<Vec<DocumentId>, GatewayError> {
        let mut encoded = Vec::with_capacity(docs.len());
        for doc in docs {
            encoded.push((DocumentId(Uuid::new_v4()), serde_json::to_value(doc)?));
        }
        let ids = encoded.iter().map(|(id, _)| *id).collect();
        self.documents.write().await.extend(encoded);
        Ok(ids)
    }

    async fn find(&self, filter: &MatchFilter, limit: Option<usize>) -> Result<Vec<StoredDocument>, GatewayError> {
        let documents = self.documents.read().await;
        let mut out = Vec::new();
        for (id, value) in documents.iter() {
            let document: MatchDocument = serde_json::from_value(value.clone())?;
            if filter.matches(&document) {
                out.push(StoredDocument { id: *id, document });
                if limit.is_some_and(|l| out.len() >= l) {
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn update_one(&self, id: DocumentId, update: &DocumentUpdate) -> Result<bool, GatewayError> {
        if self.failing.read().await.contains(&id) {
            return Err(GatewayError::Other(format!("update of document {} rejected", id)));
        }
        let mut documents = self.documents.write().await;
        let Some((_, value)) = documents.iter_mut().find(|(d, _)| *d == id) else {
            return Ok(false);
        };
        let mut patched = value.clone();
        apply_update(&mut patched, update)?;
        // Reject patches that break the document shape.
        serde_json::from_value::<MatchDocument>(patched.clone())?;
        *value = patched;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Position, TeamRef};
    use chrono::NaiveDate;

    fn team(shortname: &str) -> Team {
        Team {
            name: shortname.to_string(),
            shortname: shortname.to_string(),
            stadium: String::new(),
            founded: None,
            country: "France".to_string(),
        }
    }

    #[tokio::test]
    async fn batch_with_dangling_reference_rolls_back() {
        let store = MemoryRelationalStore::new();
        store.upsert_teams(&[team("Lens")]).await.unwrap();
        let lens = store.teams().await[0].0;

        let player = |last: &str, team_id| Player {
            first_name: "A".into(),
            last_name: last.into(),
            birthdate: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            nationality: "France".into(),
            position: Position::Defender,
            team_id,
        };
        let result = store
            .upsert_players(&[player("Valid", lens), player("Dangling", TeamId(999))])
            .await;
        assert!(result.is_err());
        assert!(store.players().await.is_empty());
    }

    #[tokio::test]
    async fn team_keys_fold_case_and_spacing() {
        let store = MemoryRelationalStore::new();
        store.upsert_teams(&[team("Paris  FC")]).await.unwrap();
        let count = store.upsert_teams(&[team("paris fc")]).await.unwrap();
        assert_eq!(count, UpsertCount { inserted: 0, updated: 1 });
        assert_eq!(store.teams().await.len(), 1);
    }

    #[tokio::test]
    async fn rejected_update_leaves_document_untouched() {
        let store = MemoryDocumentStore::new();
        let doc = MatchDocument {
            league: "Ligue 2".into(),
            season: "2023-2024".into(),
            matchday: 1,
            matches: vec![crate::model::Fixture {
                date: NaiveDate::from_ymd_opt(2023, 7, 29).unwrap(),
                home_team: TeamRef::unresolved("Amiens"),
                away_team: TeamRef::unresolved("Grenoble"),
                score_halftime: Default::default(),
                score: Default::default(),
            }],
        };
        let ids = store.insert_many(&[doc.clone()]).await.unwrap();

        // A string id would break the document shape.
        let bad = DocumentUpdate::default().set("matches.0.home_team.id", Value::String("x".into()));
        assert!(store.update_one(ids[0], &bad).await.is_err());
        assert_eq!(store.all().await.unwrap()[0].document, doc);

        store.fail_updates_for(ids[0]).await;
        let good = DocumentUpdate::default().set("matches.0.home_team.id", Value::from(3));
        assert!(store.update_one(ids[0], &good).await.is_err());
        assert!(!store.update_one(DocumentId(Uuid::new_v4()), &good).await.unwrap());
    }
}
