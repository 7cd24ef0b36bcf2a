//! Reconciliation pipeline.
//!
//! Every entity type walks `Fetched -> Normalized -> Resolved -> Persisted`.
//! Record failures are reported and skipped; a gateway error aborts only the
//! batch of the entity type being written. Stages run in dependency order:
//! teams, leagues, staff, players, rankings, then match documents.

use serde_json::json;
use std::collections::BTreeSet;
use std::future::Future;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{GatewayError, MalformedSource, RecordError};
use crate::model::{League, LeagueId, LeagueName, MatchDocument, TeamId, UpsertCount};
use crate::normalize::lookup_key;
use crate::resolver::IdentityResolver;
use crate::sources::{RawCoach, RawMatchday, RawPlayer, RawRanking, RawTeam, SourceBundle};
use crate::store::{DocumentId, DocumentUpdate, Gateways, MatchFilter};

pub mod collect;
pub mod records;
pub mod report;

use collect::Records;
use records::RecordKey;
pub use report::{EntityKind, EntityReport, RunReport, RunSummary, SkipReason, Stage};

pub struct Pipeline {
    gateways: Gateways,
    resolver: IdentityResolver,
    seasons: Vec<i32>,
    skip_api_teams: Vec<String>,
}

impl Pipeline {
    pub fn new(config: &Config, gateways: Gateways) -> Self {
        let resolver = IdentityResolver::new(
            gateways.relational.clone(),
            config.team_overrides.clone(),
            config.substring_policy,
        );
        Self {
            gateways,
            resolver,
            seasons: config.seasons.clone(),
            skip_api_teams: config.skip_api_teams.iter().map(|s| lookup_key(s)).collect(),
        }
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Full reconciliation of one snapshot.
    pub async fn run(&self, bundle: &SourceBundle) -> RunReport {
        let mut report = RunReport::start();
        info!("Reconciliation run started");

        let (rankings, links) = collect::rankings(bundle);
        let mut team_records = collect::api_teams(bundle, &self.skip_api_teams, &mut report);
        collect::clubs(bundle, &links, &mut team_records);
        let matchdays = collect::matchdays(bundle);

        self.persist_teams(team_records.teams, &mut report).await;
        self.persist_leagues(&rankings, &matchdays, &mut report).await;
        self.persist_staff(team_records.coaches, &mut report).await;
        self.persist_players(team_records.players, &mut report).await;
        self.persist_rankings(rankings, &mut report).await;
        self.persist_matches(matchdays, &mut report).await;

        finish(report)
    }

    /// Standings refresh: leagues and rankings only, updated in place.
    pub async fn refresh_rankings(&self, bundle: &SourceBundle) -> RunReport {
        let mut report = RunReport::start();
        info!("Standings refresh started");

        let (rankings, _) = collect::rankings(bundle);
        self.persist_leagues(&rankings, &[], &mut report).await;
        self.persist_rankings(rankings, &mut report).await;

        finish(report)
    }

    async fn persist_teams(&self, raw: Records<RawTeam>, report: &mut RunReport) {
        const KIND: EntityKind = EntityKind::Teams;
        report.entity(KIND).processed += raw.len();

        let mut teams = Vec::new();
        for record in raw {
            if let Some(team) = normalized(report, KIND, record, records::team) {
                records::merge_team(&mut teams, team);
            }
        }

        self.upsert(KIND, teams.len(), report, self.gateways.relational.upsert_teams(&teams))
            .await;
        // Newly persisted short names must be visible to the next lookups.
        self.resolver.invalidate().await;
    }

    /// Seeds both divisions for every configured season plus any season the
    /// snapshot mentions.
    async fn persist_leagues(
        &self,
        rankings: &Records<RawRanking>,
        matchdays: &[Result<RawMatchday, MalformedSource>],
        report: &mut RunReport,
    ) {
        const KIND: EntityKind = EntityKind::Leagues;
        let seasons: BTreeSet<i32> = self
            .seasons
            .iter()
            .copied()
            .chain(rankings.iter().flatten().map(|r| r.season))
            .chain(matchdays.iter().flatten().map(|m| m.season))
            .collect();

        let leagues: Vec<League> = seasons
            .into_iter()
            .flat_map(|season| LeagueName::ALL.into_iter().map(move |name| League::new(name, season)))
            .collect();
        report.entity(KIND).processed += leagues.len();

        self.upsert(KIND, leagues.len(), report, self.gateways.relational.upsert_leagues(&leagues))
            .await;
    }

    async fn persist_staff(&self, raw: Records<RawCoach>, report: &mut RunReport) {
        const KIND: EntityKind = EntityKind::Staff;
        report.entity(KIND).processed += raw.len();

        let mut staff = Vec::new();
        for record in raw {
            let Some(draft) = normalized(report, KIND, record, records::staff) else {
                continue;
            };
            let key = format!("{} / coach {} {}", draft.team, draft.first_name, draft.last_name);
            match self.team_id(KIND, &key, &draft.team, report).await {
                Ok(Some(team_id)) => staff.push(draft.into_staff(team_id)),
                Ok(None) => {}
                Err(e) => return report.entity(KIND).abort(KIND, &e),
            }
        }

        self.upsert(KIND, staff.len(), report, self.gateways.relational.upsert_staff(&staff))
            .await;
    }

    async fn persist_players(&self, raw: Records<RawPlayer>, report: &mut RunReport) {
        const KIND: EntityKind = EntityKind::Players;
        report.entity(KIND).processed += raw.len();

        let mut players = Vec::new();
        for record in raw {
            let Some(draft) = normalized(report, KIND, record, records::player) else {
                continue;
            };
            let key = format!("{} / {} {}", draft.team, draft.first_name, draft.last_name);
            match self.team_id(KIND, &key, &draft.team, report).await {
                Ok(Some(team_id)) => players.push(draft.into_player(team_id)),
                Ok(None) => {}
                Err(e) => return report.entity(KIND).abort(KIND, &e),
            }
        }

        self.upsert(KIND, players.len(), report, self.gateways.relational.upsert_players(&players))
            .await;
    }

    async fn persist_rankings(&self, raw: Records<RawRanking>, report: &mut RunReport) {
        const KIND: EntityKind = EntityKind::Rankings;
        report.entity(KIND).processed += raw.len();

        let mut rankings = Vec::new();
        for record in raw {
            let Some(ranking) = normalized(report, KIND, record, records::ranking) else {
                continue;
            };
            let key = ranking.record_key();

            let league_id = match self.league_id(&ranking, &key, report).await {
                Ok(Some(id)) => id,
                Ok(None) => continue,
                Err(e) => return report.entity(KIND).abort(KIND, &e),
            };
            match self.team_id(KIND, &key, &ranking.team, report).await {
                Ok(Some(team_id)) => rankings.push(records::into_ranking(ranking, team_id, league_id)),
                Ok(None) => {}
                Err(e) => return report.entity(KIND).abort(KIND, &e),
            }
        }

        self.upsert(KIND, rankings.len(), report, self.gateways.relational.upsert_rankings(&rankings))
            .await;
    }

    /// Two-phase write. Documents sharing a key within the run are folded
    /// first. Phase one stores every document with team names only
    /// (refreshing documents already stored under the same key); phase two
    /// resolves names and patches the ids in place. A document is patched
    /// only after its write returned.
    async fn persist_matches(&self, raw: Records<RawMatchday>, report: &mut RunReport) {
        const KIND: EntityKind = EntityKind::Matches;
        report.entity(KIND).processed += raw.len();

        let mut documents = Vec::new();
        for record in raw {
            match record {
                Ok(day) => {
                    let (document, failures) = records::match_document(day);
                    for (key, err) in failures {
                        report.entity(KIND).skip(key, &err);
                    }
                    records::merge_document(&mut documents, document);
                }
                Err(e) => report.entity(KIND).skip(e.key.clone(), &e.into()),
            }
        }

        // Phase 1
        let mut written: Vec<(DocumentId, MatchDocument)> = Vec::new();
        let mut fresh: Vec<MatchDocument> = Vec::new();
        for document in documents {
            let key = document.key();
            let filter = MatchFilter::by_key(&key.league, &key.season, key.matchday);
            let existing = match self.gateways.documents.find(&filter, Some(1)).await {
                Ok(found) => found.into_iter().next(),
                Err(e) => return report.entity(KIND).abort(KIND, &e),
            };
            let Some(stored) = existing else {
                fresh.push(document);
                continue;
            };

            let update = match serde_json::to_value(&document.matches) {
                Ok(matches) => DocumentUpdate::default().set("matches", matches),
                Err(e) => {
                    report.entity(KIND).patch_failed(key.to_string(), e.to_string());
                    continue;
                }
            };
            match self.gateways.documents.update_one(stored.id, &update).await {
                Ok(true) => {
                    report.entity(KIND).updated += 1;
                    written.push((stored.id, document));
                }
                Ok(false) => fresh.push(document),
                Err(e) => report.entity(KIND).patch_failed(key.to_string(), e.to_string()),
            }
        }

        if !fresh.is_empty() {
            match self.gateways.documents.insert_many(&fresh).await {
                Ok(ids) => {
                    report.entity(KIND).inserted += ids.len();
                    written.extend(ids.into_iter().zip(fresh));
                }
                Err(e) => return report.entity(KIND).abort(KIND, &e),
            }
        }
        info!("Stored {} match documents, patching team ids", written.len());

        // Phase 2
        for (id, document) in &written {
            let key = document.key().to_string();
            let update = match self.fixture_ids(document, report).await {
                Ok(update) => update,
                Err(e) => {
                    report.entity(KIND).patch_failed(key, e.to_string());
                    continue;
                }
            };
            if update.is_empty() {
                continue;
            }
            match self.gateways.documents.update_one(*id, &update).await {
                Ok(true) => report.entity(KIND).patched += 1,
                Ok(false) => report.entity(KIND).patch_failed(key, "document no longer stored"),
                Err(e) => report.entity(KIND).patch_failed(key, e.to_string()),
            }
        }

        let entity = report.entity(KIND);
        info!(
            "Matches: {} inserted, {} refreshed, {} patched, {} skipped",
            entity.inserted,
            entity.updated,
            entity.patched,
            entity.skipped.len()
        );
    }

    /// `$set` of every fixture team id the resolver can map.
    async fn fixture_ids(&self, document: &MatchDocument, report: &mut RunReport) -> Result<DocumentUpdate, GatewayError> {
        let context = document.key().to_string();
        let mut update = DocumentUpdate::default();
        for (index, fixture) in document.matches.iter().enumerate() {
            for (side, team) in [("home_team", &fixture.home_team), ("away_team", &fixture.away_team)] {
                match self.resolver.resolve_team(&team.name).await? {
                    Ok(resolution) => {
                        update = update.set(format!("matches.{}.{}.id", index, side), json!(resolution.team_id.0));
                    }
                    Err(e) => report.unresolved(EntityKind::Matches, &team.name, context.as_str(), &e),
                }
            }
        }
        Ok(update)
    }

    /// `Ok(None)` when the name did not resolve; the record is then reported
    /// as skipped and its reference as unresolved.
    async fn team_id(
        &self,
        kind: EntityKind,
        key: &str,
        candidate: &str,
        report: &mut RunReport,
    ) -> Result<Option<TeamId>, GatewayError> {
        match self.resolver.resolve_team(candidate).await? {
            Ok(resolution) => Ok(Some(resolution.team_id)),
            Err(e) => {
                report.unresolved(kind, candidate, key, &e);
                report.entity(kind).skip(key, &RecordError::Resolve(e));
                Ok(None)
            }
        }
    }

    async fn league_id(
        &self,
        ranking: &RawRanking,
        key: &str,
        report: &mut RunReport,
    ) -> Result<Option<LeagueId>, GatewayError> {
        let candidate = ranking.league.as_str();
        match self.resolver.resolve_league(candidate, ranking.season).await? {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                report.unresolved(EntityKind::Rankings, candidate, key, &e);
                report.entity(EntityKind::Rankings).skip(key, &RecordError::Resolve(e));
                Ok(None)
            }
        }
    }

    async fn upsert<F>(&self, kind: EntityKind, batch: usize, report: &mut RunReport, write: F)
    where
        F: Future<Output = Result<UpsertCount, GatewayError>>,
    {
        if batch == 0 {
            info!("{:?}: nothing to write", kind);
            return;
        }
        let entity = report.entity(kind);
        match write.await {
            Ok(count) => {
                entity.record_upserts(count);
                info!(
                    "{:?}: {} inserted, {} updated, {} skipped",
                    kind,
                    count.inserted,
                    count.updated,
                    entity.skipped.len()
                );
            }
            Err(e) => entity.abort(kind, &e),
        }
    }
}

/// Fetched -> Normalized for one record; failures land in the report.
fn normalized<R, T>(
    report: &mut RunReport,
    kind: EntityKind,
    record: Result<R, MalformedSource>,
    normalize: impl FnOnce(R) -> Result<T, RecordError>,
) -> Option<T>
where
    R: RecordKey,
{
    let raw = match record {
        Ok(raw) => raw,
        Err(e) => {
            report.entity(kind).skip(e.key.clone(), &e.into());
            return None;
        }
    };
    let key = raw.record_key();
    match normalize(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            report.entity(kind).skip(key, &e);
            None
        }
    }
}

fn finish(mut report: RunReport) -> RunReport {
    report.finish();
    let summary = report.summary();
    info!(
        "Run finished: {} processed, {} upserted, {} skipped, {} unresolved",
        summary.processed,
        summary.upserted,
        summary.skipped.values().sum::<usize>(),
        summary.unresolved
    );
    match serde_json::to_string(&report) {
        Ok(json) => info!("Run report: {}", json),
        Err(e) => warn!("Run report could not be serialized: {}", e),
    }
    report
}
