//! Fetched -> Normalized: per-record normalization into drafts that still
//! carry their team as free text.

use chrono::NaiveDate;

use crate::error::{MalformedSource, RecordError};
use crate::model::{
    season_label, Fixture, LeagueId, MatchDocument, Player, Position, Ranking, Staff, StaffRole, Team, TeamId,
    TeamRef, DEFAULT_COUNTRY,
};
use crate::normalize::{lookup_key, normalize_date, normalize_nationality, normalize_position, split_full_name, strip_markup};
use crate::sources::{RawCoach, RawMatchday, RawPlayer, RawRanking, RawTeam};

/// Identifying key used in logs and the run report.
pub trait RecordKey {
    fn record_key(&self) -> String;
}

impl RecordKey for RawTeam {
    fn record_key(&self) -> String {
        if self.shortname.is_empty() {
            self.name.clone()
        } else {
            self.shortname.clone()
        }
    }
}

impl RecordKey for RawCoach {
    fn record_key(&self) -> String {
        format!("{} / coach {}", self.team, self.name)
    }
}

impl RecordKey for RawPlayer {
    fn record_key(&self) -> String {
        format!("{} / {}", self.team, self.name)
    }
}

impl RecordKey for RawRanking {
    fn record_key(&self) -> String {
        format!("{} {} {} {}", self.league, self.season, self.kind, self.team)
    }
}

pub fn team(raw: RawTeam) -> Result<Team, RecordError> {
    let shortname = strip_markup(&raw.shortname);
    if shortname.is_empty() {
        return Err(MalformedSource::new("team", raw.name, "empty short name").into());
    }
    let name = match strip_markup(&raw.name) {
        name if name.is_empty() => shortname.clone(),
        name => name,
    };
    Ok(Team {
        name,
        shortname,
        stadium: raw.stadium.map(|s| strip_markup(&s)).unwrap_or_default(),
        founded: raw.founded,
        country: DEFAULT_COUNTRY.to_string(),
    })
}

/// Add `team` to the batch, folding it into an earlier record with the same
/// short name. The first source wins; later ones only fill gaps.
pub fn merge_team(batch: &mut Vec<Team>, team: Team) {
    let key = lookup_key(&team.shortname);
    match batch.iter_mut().find(|t| lookup_key(&t.shortname) == key) {
        Some(existing) => {
            if existing.stadium.is_empty() {
                existing.stadium = team.stadium;
            }
            if existing.founded.is_none() {
                existing.founded = team.founded;
            }
        }
        None => batch.push(team),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffDraft {
    pub team: String,
    pub first_name: String,
    pub last_name: String,
    pub birthdate: Option<NaiveDate>,
    pub nationality: String,
}

impl StaffDraft {
    pub fn into_staff(self, team_id: TeamId) -> Staff {
        Staff {
            first_name: self.first_name,
            last_name: self.last_name,
            birthdate: self.birthdate,
            nationality: self.nationality,
            role: StaffRole::Coach,
            team_id,
        }
    }
}

pub fn staff(raw: RawCoach) -> Result<StaffDraft, RecordError> {
    let (first_name, last_name) = split_full_name(&raw.name);
    let birthdate = match raw.birthdate.as_deref() {
        Some(date) if !date.trim().is_empty() => Some(normalize_date(date, raw.origin.locale())?),
        _ => None,
    };
    let nationality = normalize_nationality(raw.nationality.as_deref().unwrap_or_default())?;

    Ok(StaffDraft {
        team: raw.team,
        first_name,
        last_name,
        birthdate,
        nationality,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerDraft {
    pub team: String,
    pub first_name: String,
    pub last_name: String,
    pub birthdate: NaiveDate,
    pub nationality: String,
    pub position: Position,
}

impl PlayerDraft {
    pub fn into_player(self, team_id: TeamId) -> Player {
        Player {
            first_name: self.first_name,
            last_name: self.last_name,
            birthdate: self.birthdate,
            nationality: self.nationality,
            position: self.position,
            team_id,
        }
    }
}

pub fn player(raw: RawPlayer) -> Result<PlayerDraft, RecordError> {
    let (first_name, last_name) = split_full_name(&raw.name);
    Ok(PlayerDraft {
        birthdate: normalize_date(&raw.birthdate, raw.origin.locale())?,
        nationality: normalize_nationality(&raw.nationality)?,
        position: normalize_position(&raw.position, raw.origin.positions())?,
        team: raw.team,
        first_name,
        last_name,
    })
}

/// Ranking values arrive numeric; only the team reference needs cleanup.
pub fn ranking(mut raw: RawRanking) -> Result<RawRanking, RecordError> {
    raw.team = strip_markup(&raw.team);
    Ok(raw)
}

pub fn into_ranking(raw: RawRanking, team_id: TeamId, league_id: LeagueId) -> Ranking {
    Ranking {
        team_id,
        league_id,
        kind: raw.kind,
        position: raw.position,
        points: raw.points,
        played: raw.played,
        won: raw.won,
        draw: raw.draw,
        lost: raw.lost,
        goals_for: raw.goals_for,
        goals_against: raw.goals_against,
    }
}

/// Add `document` to the batch, folding it into an earlier document with the
/// same `(league, season, matchday)`. Fixtures already present for the same
/// pairing keep the first source's version.
pub fn merge_document(batch: &mut Vec<MatchDocument>, document: MatchDocument) {
    let key = document.key();
    let Some(existing) = batch.iter_mut().find(|d| d.key() == key) else {
        batch.push(document);
        return;
    };
    for fixture in document.matches {
        let pairing = fixture_pairing(&fixture);
        if !existing.matches.iter().any(|f| fixture_pairing(f) == pairing) {
            existing.matches.push(fixture);
        }
    }
}

fn fixture_pairing(fixture: &Fixture) -> (String, String) {
    (lookup_key(&fixture.home_team.name), lookup_key(&fixture.away_team.name))
}

/// Raw document shape: team names only, ids left for the patch phase.
/// Fixtures that fail normalization are returned alongside with their key.
pub fn match_document(raw: RawMatchday) -> (MatchDocument, Vec<(String, RecordError)>) {
    let locale = raw.origin.locale();
    let mut document = MatchDocument {
        league: raw.league.as_str().to_string(),
        season: season_label(raw.season),
        matchday: raw.matchday,
        matches: Vec::with_capacity(raw.fixtures.len()),
    };
    let mut failures = Vec::new();

    for (index, fixture) in raw.fixtures.into_iter().enumerate() {
        let fixture = match fixture {
            Ok(f) => f,
            Err(e) => {
                failures.push((e.key.clone(), e.into()));
                continue;
            }
        };
        let key = format!("{} {} - {}", document.key(), fixture.home_team, fixture.away_team);
        match normalize_date(&fixture.date, locale) {
            Ok(date) => document.matches.push(Fixture {
                date,
                home_team: TeamRef::unresolved(strip_markup(&fixture.home_team)),
                away_team: TeamRef::unresolved(strip_markup(&fixture.away_team)),
                score_halftime: fixture.score_halftime,
                score: fixture.score,
            }),
            Err(e) => failures.push((format!("{} #{}", key, index + 1), e.into())),
        }
    }

    (document, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NormalizeError;
    use crate::model::{LeagueName, Score};
    use crate::sources::{Origin, RawFixture};

    fn raw_player(name: &str, birthdate: &str, nationality: &str, position: &str) -> RawPlayer {
        RawPlayer {
            origin: Origin::Scraped,
            team: "Paris FC".into(),
            name: name.into(),
            birthdate: birthdate.into(),
            nationality: nationality.into(),
            position: position.into(),
        }
    }

    #[test]
    fn scraped_player_is_normalized() {
        let draft = player(raw_player("Ilan Kebbal", "10/07/1998", "Algeria", "M")).unwrap();
        assert_eq!(draft.first_name, "Ilan");
        assert_eq!(draft.last_name, "Kebbal");
        assert_eq!(draft.birthdate, NaiveDate::from_ymd_opt(1998, 7, 10).unwrap());
        assert_eq!(draft.position, Position::Midfielder);

        let player = draft.into_player(TeamId(3));
        assert_eq!(player.team_id, TeamId(3));
    }

    #[test]
    fn player_failures_keep_their_category() {
        let err = player(raw_player("Ilan Kebbal", "10/07/1998", "Algeria", "Libero")).unwrap_err();
        assert!(matches!(err, RecordError::Normalize(NormalizeError::UnknownPosition(_))));

        let err = player(raw_player("Ilan Kebbal", "July 10th", "Algeria", "M")).unwrap_err();
        assert!(matches!(err, RecordError::Normalize(NormalizeError::DateFormat(_))));
    }

    #[test]
    fn coach_without_birthdate_is_kept() {
        let draft = staff(RawCoach {
            origin: Origin::Api,
            team: "Lens".into(),
            name: "Franck Haise".into(),
            birthdate: None,
            nationality: Some("France".into()),
        })
        .unwrap();
        assert_eq!(draft.birthdate, None);
        assert_eq!(draft.last_name, "Haise");
        assert_eq!(draft.into_staff(TeamId(1)).role, StaffRole::Coach);
    }

    #[test]
    fn teams_merge_by_short_name() {
        let mut batch = Vec::new();
        let scraped = team(RawTeam {
            origin: Origin::Scraped,
            name: "Paris Football Club".into(),
            shortname: "Paris FC".into(),
            stadium: None,
            founded: Some(1969),
        })
        .unwrap();
        let api = team(RawTeam {
            origin: Origin::Api,
            name: "Paris FC".into(),
            shortname: "PARIS FC".into(),
            stadium: Some("Stade Charléty[1]".into()),
            founded: None,
        })
        .unwrap();
        merge_team(&mut batch, scraped);
        merge_team(&mut batch, api);

        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].name, "Paris Football Club");
        assert_eq!(batch[0].stadium, "Stade Charléty");
        assert_eq!(batch[0].founded, Some(1969));
    }

    #[test]
    fn match_document_leaves_ids_empty() {
        let raw = RawMatchday {
            origin: Origin::Scraped,
            league: LeagueName::Ligue2,
            season: 2023,
            matchday: 1,
            fixtures: vec![
                Ok(RawFixture {
                    date: "samedi 29 juillet 2023".into(),
                    home_team: "Amiens".into(),
                    away_team: "Grenoble".into(),
                    score_halftime: Score::default(),
                    score: Score { home: Some(1), away: Some(0) },
                }),
                Ok(RawFixture {
                    date: "someday".into(),
                    home_team: "Bastia".into(),
                    away_team: "Rodez".into(),
                    score_halftime: Score::default(),
                    score: Score::default(),
                }),
            ],
        };

        let (document, failures) = match_document(raw);
        assert_eq!(document.season, "2023-2024");
        assert_eq!(document.league, "Ligue 2");
        assert_eq!(document.matches.len(), 1);
        assert_eq!(document.matches[0].home_team, TeamRef::unresolved("Amiens"));
        assert_eq!(failures.len(), 1);
        assert!(failures[0].0.contains("Bastia - Rodez"));
    }

    fn document(matchday: u32, fixtures: &[(&str, &str, i32)]) -> MatchDocument {
        MatchDocument {
            league: "Ligue 2".into(),
            season: "2022-2023".into(),
            matchday,
            matches: fixtures
                .iter()
                .map(|(home, away, goals)| Fixture {
                    date: NaiveDate::from_ymd_opt(2022, 7, 30).unwrap(),
                    home_team: TeamRef::unresolved(*home),
                    away_team: TeamRef::unresolved(*away),
                    score_halftime: Score::default(),
                    score: Score { home: Some(*goals), away: Some(0) },
                })
                .collect(),
        }
    }

    #[test]
    fn documents_with_the_same_key_fold_into_one() {
        let mut batch = Vec::new();
        merge_document(&mut batch, document(1, &[("Paris FC", "Le Havre", 2)]));
        merge_document(&mut batch, document(2, &[("Le Havre", "Paris FC", 1)]));
        merge_document(
            &mut batch,
            document(1, &[("paris  fc", "Le Havre", 5), ("Bastia", "Annecy", 1)]),
        );

        assert_eq!(batch.len(), 2);
        let first = &batch[0];
        assert_eq!(first.matchday, 1);
        assert_eq!(first.matches.len(), 2);
        assert_eq!(first.matches[0].score.home, Some(2));
        assert_eq!(first.matches[1].home_team.name, "Bastia");
    }
}
