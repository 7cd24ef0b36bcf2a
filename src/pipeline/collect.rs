//! Runs the source adapters over a bundle. Payload-level failures become
//! skipped records of the entity type the payload would have produced.

use std::collections::HashSet;
use tracing::debug;

use super::records::RecordKey;
use super::report::{EntityKind, RunReport};
use crate::error::MalformedSource;
use crate::model::LeagueName;
use crate::normalize::lookup_key;
use crate::sources::wiki::CoachRef;
use crate::sources::{api, results, squad, wiki, ClubLink, RawCoach, RawMatchday, RawPlayer, RawRanking, RawTeam};
use crate::sources::{Origin, SourceBundle};

pub type Records<T> = Vec<Result<T, MalformedSource>>;

/// Team-derived records: clubs plus their coach and squad.
#[derive(Debug, Default)]
pub struct TeamRecords {
    pub teams: Records<RawTeam>,
    pub coaches: Records<RawCoach>,
    pub players: Records<RawPlayer>,
}

/// Standings from the API and the scraped ranking tables. The club links of
/// the scraped tables lead to the club pages.
pub fn rankings(bundle: &SourceBundle) -> (Records<RawRanking>, Vec<ClubLink>) {
    let mut records = Vec::new();
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    for payload in &bundle.api_standings {
        match api::standings(&payload.body, payload.season) {
            Ok(rows) => records.extend(rows),
            Err(e) => records.push(Err(e)),
        }
    }

    for payload in &bundle.wiki_rankings {
        match wiki::rankings(&payload.body, LeagueName::Ligue2, payload.season) {
            Ok(rows) => {
                for row in rows {
                    match row {
                        Ok(row) => {
                            if seen.insert(row.club.href.clone()) {
                                links.push(row.club);
                            }
                            records.push(Ok(row.ranking));
                        }
                        Err(e) => records.push(Err(e)),
                    }
                }
            }
            Err(e) => records.push(Err(e)),
        }
    }

    (records, links)
}

/// API team payloads. Teams on `skip_keys` (lookup keys of short names) are
/// reported as excluded along with their coach and squad.
pub fn api_teams(bundle: &SourceBundle, skip_keys: &[String], report: &mut RunReport) -> TeamRecords {
    let mut records = TeamRecords::default();

    for payload in &bundle.api_teams {
        let adapted = match api::team(&payload.body, &payload.name) {
            Ok(adapted) => adapted,
            Err(e) => {
                records.teams.push(Err(e));
                continue;
            }
        };

        if skip_keys.contains(&lookup_key(&adapted.team.shortname)) {
            exclude(report, EntityKind::Teams, adapted.team.record_key());
            if let Some(Ok(coach)) = &adapted.coach {
                exclude(report, EntityKind::Staff, coach.record_key());
            }
            for player in adapted.squad.iter().flatten() {
                exclude(report, EntityKind::Players, player.record_key());
            }
            continue;
        }

        records.teams.push(Ok(adapted.team));
        records.coaches.extend(adapted.coach);
        records.players.extend(adapted.squad);
    }

    records
}

fn exclude(report: &mut RunReport, kind: EntityKind, key: String) {
    let entity = report.entity(kind);
    entity.processed += 1;
    entity.exclude(key);
}

/// Club pages reached through the ranking links, with the coach page and
/// squad export stored under the same naming scheme.
pub fn clubs(bundle: &SourceBundle, links: &[ClubLink], into: &mut TeamRecords) {
    for link in links {
        let slug = link.slug();
        let Some(page) = bundle.club_pages.get(&slug) else {
            into.teams
                .push(Err(MalformedSource::new("wiki", slug, "club page missing from snapshot")));
            continue;
        };

        let club = match wiki::club(page, link) {
            Ok(club) => club,
            Err(e) => {
                into.teams.push(Err(e));
                continue;
            }
        };
        let shortname = club.team.shortname.clone();
        into.teams.push(Ok(club.team));

        match club.coach {
            Some(CoachRef::Page { href, name }) => {
                let coach_slug = crate::sources::slug(&href);
                match bundle.coach_pages.get(&coach_slug) {
                    Some(page) => into.coaches.push(wiki::coach(page, &shortname, &href, &name)),
                    None => into.coaches.push(Err(MalformedSource::new(
                        "wiki",
                        coach_slug,
                        "coach page missing from snapshot",
                    ))),
                }
            }
            Some(CoachRef::Name(name)) => into.coaches.push(Ok(RawCoach {
                origin: Origin::Scraped,
                team: shortname.clone(),
                name,
                birthdate: None,
                nationality: None,
            })),
            None => debug!("No coach listed for {}", shortname),
        }

        match bundle.squads.get(&slug) {
            Some(body) => match squad::squad(body, &shortname, &slug) {
                Ok(players) => into.players.extend(players),
                Err(e) => into.players.push(Err(e)),
            },
            None => debug!("No squad export for {}", slug),
        }
    }
}

/// API matchdays and results site pages (second division).
pub fn matchdays(bundle: &SourceBundle) -> Records<RawMatchday> {
    let api = bundle
        .api_matchdays
        .iter()
        .map(|p| api::matchday(&p.body, p.season, p.matchday));
    let scraped = bundle
        .result_pages
        .iter()
        .map(|p| results::matchday(&p.body, LeagueName::Ligue2, p.season, p.matchday));
    api.chain(scraped).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::snapshot::NamedPayload;

    fn team_payload(short_name: &str) -> NamedPayload {
        NamedPayload {
            name: format!("team-{}", short_name),
            body: format!(
                r#"{{"name": "{0} FC", "shortName": "{0}", "venue": "Stade", "founded": 1900,
                    "coach": {{"name": "Jean Coach", "dateOfBirth": "1970-01-01", "nationality": "France"}},
                    "squad": [
                        {{"name": "Un Joueur", "position": "Goalkeeper", "dateOfBirth": "2000-01-01", "nationality": "France"}},
                        {{"name": "Deux Joueur", "position": "Defence", "dateOfBirth": "2000-01-02", "nationality": "France"}}
                    ]}}"#,
                short_name
            ),
        }
    }

    #[test]
    fn excluded_api_teams_are_reported_with_their_people() {
        let bundle = SourceBundle {
            api_teams: vec![team_payload("Lens"), team_payload("Le Havre")],
            ..SourceBundle::default()
        };
        let mut report = RunReport::start();
        let records = api_teams(&bundle, &[lookup_key("Le Havre")], &mut report);

        assert_eq!(records.teams.len(), 1);
        assert_eq!(records.coaches.len(), 1);
        assert_eq!(records.players.len(), 2);

        let teams = report.get(EntityKind::Teams).unwrap();
        assert_eq!(teams.skipped[0].key, "Le Havre");
        assert_eq!(report.get(EntityKind::Players).unwrap().skipped.len(), 2);
        assert_eq!(report.get(EntityKind::Staff).unwrap().processed, 1);
    }

    #[test]
    fn missing_club_page_is_a_skipped_team() {
        let link = ClubLink {
            href: "/wiki/Rodez_AF".into(),
            title: "Rodez Aveyron Football".into(),
            text: "Rodez".into(),
        };
        let mut records = TeamRecords::default();
        clubs(&SourceBundle::default(), &[link], &mut records);
        assert_eq!(records.teams.len(), 1);
        assert_eq!(records.teams[0].as_ref().unwrap_err().key, "Rodez_AF");
    }

    #[test]
    fn error_payloads_become_skipped_records() {
        let bundle = SourceBundle {
            api_standings: vec![crate::sources::snapshot::SeasonPayload {
                season: 2023,
                body: r#"{"errorCode": 429, "message": "Too many requests"}"#.into(),
            }],
            ..SourceBundle::default()
        };
        let (records, links) = rankings(&bundle);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_err());
        assert!(links.is_empty());
    }
}
