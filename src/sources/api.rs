//! football-data.org v4 payloads: standings, team + squad, matchday fixtures.
//!
//! The API answers rate-limit and permission failures with a JSON body
//! carrying `errorCode` (or `error`) instead of data; those payloads are
//! reported as malformed, never parsed as empty data.

use serde::Deserialize;
use serde_json::Value;

use super::{Adapted, Origin, RawCoach, RawFixture, RawMatchday, RawPlayer, RawRanking, RawTeam};
use crate::error::MalformedSource;
use crate::model::{LeagueName, RankingType, Score};

const SOURCE: &str = "api";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ApiTeamRef {
    pub id: Option<i64>,
    pub name: Option<String>,
    #[serde(rename = "shortName")]
    pub short_name: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ApiCompetition {
    pub code: Option<String>,
    pub name: Option<String>,
}

impl ApiCompetition {
    fn league(&self) -> Option<LeagueName> {
        self.code
            .as_deref()
            .and_then(LeagueName::parse)
            .or_else(|| self.name.as_deref().and_then(LeagueName::parse))
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StandingRow {
    pub position: Option<i32>,
    pub team: ApiTeamRef,
    #[serde(rename = "playedGames")]
    pub played_games: Option<i32>,
    pub won: Option<i32>,
    pub draw: Option<i32>,
    pub lost: Option<i32>,
    pub points: Option<i32>,
    #[serde(rename = "goalsFor")]
    pub goals_for: Option<i32>,
    #[serde(rename = "goalsAgainst")]
    pub goals_against: Option<i32>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Standing {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub table: Vec<StandingRow>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct StandingsResponse {
    pub competition: ApiCompetition,
    pub standings: Vec<Standing>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ApiPerson {
    pub name: Option<String>,
    #[serde(rename = "dateOfBirth")]
    pub date_of_birth: Option<String>,
    pub nationality: Option<String>,
    pub position: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TeamResponse {
    pub id: Option<i64>,
    pub name: Option<String>,
    #[serde(rename = "shortName")]
    pub short_name: Option<String>,
    pub founded: Option<i32>,
    pub venue: Option<String>,
    pub coach: Option<ApiPerson>,
    pub squad: Vec<ApiPerson>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ApiScore {
    #[serde(rename = "halfTime")]
    pub half_time: Score,
    #[serde(rename = "fullTime")]
    pub full_time: Score,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ApiMatch {
    #[serde(rename = "utcDate")]
    pub utc_date: Option<String>,
    #[serde(rename = "homeTeam")]
    pub home_team: ApiTeamRef,
    #[serde(rename = "awayTeam")]
    pub away_team: ApiTeamRef,
    pub score: ApiScore,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MatchesResponse {
    pub competition: ApiCompetition,
    pub matches: Vec<ApiMatch>,
}

/// Everything one team payload yields.
#[derive(Debug, Clone)]
pub struct AdaptedTeam {
    pub team: RawTeam,
    pub coach: Option<Result<RawCoach, MalformedSource>>,
    pub squad: Vec<Result<RawPlayer, MalformedSource>>,
}

/// Parse the body, rejecting payloads that carry the API's error marker.
fn decode<T: for<'de> Deserialize<'de>>(body: &str, key: &str) -> Result<T, MalformedSource> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| MalformedSource::new(SOURCE, key, format!("invalid JSON: {}", e)))?;

    if let Some(marker) = value.get("errorCode").or_else(|| value.get("error")) {
        let message = value.get("message").and_then(Value::as_str).unwrap_or("no message");
        return Err(MalformedSource::new(
            SOURCE,
            key,
            format!("error marker {}: {}", marker, message),
        ));
    }

    serde_json::from_value(value).map_err(|e| MalformedSource::new(SOURCE, key, e.to_string()))
}

fn required<T>(value: Option<T>, key: &str, field: &str) -> Result<T, MalformedSource> {
    value.ok_or_else(|| MalformedSource::new(SOURCE, key, format!("missing {}", field)))
}

fn non_empty(value: Option<String>, key: &str, field: &str) -> Result<String, MalformedSource> {
    required(value.filter(|s| !s.trim().is_empty()), key, field)
}

/// `competitions/{code}/standings?season={season}`
pub fn standings(body: &str, season: i32) -> Adapted<RawRanking> {
    let payload_key = format!("standings {}", season);
    let response: StandingsResponse = decode(body, &payload_key)?;
    let league = required(response.competition.league(), &payload_key, "competition")?;
    if response.standings.is_empty() {
        return Err(MalformedSource::new(SOURCE, payload_key, "no standings"));
    }

    let mut records = Vec::new();
    for (index, standing) in response.standings.into_iter().enumerate() {
        // Standings come as TOTAL, HOME, AWAY when `type` is missing.
        let kind = match standing.kind.as_deref() {
            Some(raw) => RankingType::parse(raw),
            None => RankingType::PAGE_ORDER.get(index).copied(),
        };
        let Some(kind) = kind else {
            records.push(Err(MalformedSource::new(
                SOURCE,
                format!("{} #{}", payload_key, index),
                format!("unknown standing type {:?}", standing.kind),
            )));
            continue;
        };

        for row in standing.table {
            records.push(standing_row(row, league, season, kind));
        }
    }
    Ok(records)
}

fn standing_row(row: StandingRow, league: LeagueName, season: i32, kind: RankingType) -> Result<RawRanking, MalformedSource> {
    let key = format!(
        "{} {} {} {}",
        league,
        season,
        kind,
        row.team.short_name.as_deref().unwrap_or("?")
    );
    Ok(RawRanking {
        origin: Origin::Api,
        league,
        season,
        kind,
        team: non_empty(row.team.short_name, &key, "team.shortName")?,
        position: required(row.position, &key, "position")?,
        points: required(row.points, &key, "points")?,
        played: required(row.played_games, &key, "playedGames")?,
        won: required(row.won, &key, "won")?,
        draw: required(row.draw, &key, "draw")?,
        lost: required(row.lost, &key, "lost")?,
        goals_for: required(row.goals_for, &key, "goalsFor")?,
        goals_against: required(row.goals_against, &key, "goalsAgainst")?,
    })
}

/// `teams/{id}`: the club plus its coach and squad.
pub fn team(body: &str, payload_key: &str) -> Result<AdaptedTeam, MalformedSource> {
    let response: TeamResponse = decode(body, payload_key)?;
    let shortname = non_empty(response.short_name, payload_key, "shortName")?;
    let name = non_empty(response.name, payload_key, "name")?;

    let coach = response.coach.map(|coach| -> Result<RawCoach, MalformedSource> {
        let key = format!("coach of {}", shortname);
        Ok(RawCoach {
            origin: Origin::Api,
            team: shortname.clone(),
            name: non_empty(coach.name, &key, "coach.name")?,
            birthdate: coach.date_of_birth,
            nationality: coach.nationality,
        })
    });

    let squad = response
        .squad
        .into_iter()
        .map(|player| -> Result<RawPlayer, MalformedSource> {
            let key = format!(
                "{} / {}",
                shortname,
                player.name.as_deref().unwrap_or("?")
            );
            Ok(RawPlayer {
                origin: Origin::Api,
                team: shortname.clone(),
                name: non_empty(player.name, &key, "name")?,
                birthdate: non_empty(player.date_of_birth, &key, "dateOfBirth")?,
                nationality: non_empty(player.nationality, &key, "nationality")?,
                position: non_empty(player.position, &key, "position")?,
            })
        })
        .collect();

    Ok(AdaptedTeam {
        team: RawTeam {
            origin: Origin::Api,
            name,
            shortname,
            stadium: response.venue,
            founded: response.founded,
        },
        coach,
        squad,
    })
}

/// `competitions/{code}/matches?season={season}&matchday={matchday}`
pub fn matchday(body: &str, season: i32, matchday: u32) -> Result<RawMatchday, MalformedSource> {
    let payload_key = format!("matches {} J{}", season, matchday);
    let response: MatchesResponse = decode(body, &payload_key)?;
    let league = required(response.competition.league(), &payload_key, "competition")?;

    let fixtures = response
        .matches
        .into_iter()
        .enumerate()
        .map(|(index, game)| -> Result<RawFixture, MalformedSource> {
            let key = format!("{} #{}", payload_key, index + 1);
            Ok(RawFixture {
                date: non_empty(game.utc_date, &key, "utcDate")?,
                home_team: non_empty(game.home_team.short_name, &key, "homeTeam.shortName")?,
                away_team: non_empty(game.away_team.short_name, &key, "awayTeam.shortName")?,
                score_halftime: game.score.half_time,
                score: game.score.full_time,
            })
        })
        .collect();

    Ok(RawMatchday {
        origin: Origin::Api,
        league,
        season,
        matchday,
        fixtures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDINGS: &str = r#"{
        "competition": {"code": "FL1", "name": "Ligue 1"},
        "standings": [
            {"type": "TOTAL", "table": [
                {"position": 1, "team": {"id": 524, "shortName": "PSG"}, "playedGames": 34,
                 "won": 22, "draw": 10, "lost": 2, "points": 76, "goalsFor": 81, "goalsAgainst": 33},
                {"position": 2, "team": {"id": 548}, "playedGames": 34,
                 "won": 20, "draw": 7, "lost": 7, "points": 67, "goalsFor": 68, "goalsAgainst": 42}
            ]},
            {"type": "HOME", "table": [
                {"position": 1, "team": {"id": 524, "shortName": "PSG"}, "playedGames": 17,
                 "won": 12, "draw": 4, "lost": 1, "points": 40, "goalsFor": 45, "goalsAgainst": 17}
            ]}
        ]
    }"#;

    #[test]
    fn standings_yield_one_record_per_row() {
        let records = standings(STANDINGS, 2023).unwrap();
        assert_eq!(records.len(), 3);

        let first = records[0].as_ref().unwrap();
        assert_eq!(first.team, "PSG");
        assert_eq!(first.kind, RankingType::Total);
        assert_eq!(first.league, LeagueName::Ligue1);
        assert_eq!((first.points, first.played, first.goals_for), (76, 34, 81));

        // Missing short name skips only that row.
        assert!(records[1].is_err());
        assert_eq!(records[2].as_ref().unwrap().kind, RankingType::Home);
    }

    #[test]
    fn error_marker_is_malformed_payload() {
        let body = r#"{"message": "You reached your request limit.", "errorCode": 429}"#;
        let err = standings(body, 2023).unwrap_err();
        assert!(err.reason.contains("429"));

        let err = team(r#"{"error": 403, "message": "restricted"}"#, "team-512").unwrap_err();
        assert_eq!(err.key, "team-512");
    }

    #[test]
    fn team_payload_yields_club_coach_and_squad() {
        let body = r#"{
            "id": 548, "name": "AS Monaco FC", "shortName": "Monaco", "founded": 1919,
            "venue": "Stade Louis II",
            "coach": {"name": "Adi Hütter", "dateOfBirth": "1970-02-11", "nationality": "Austria"},
            "squad": [
                {"name": "Philipp Köhn", "position": "Goalkeeper", "dateOfBirth": "1998-04-02", "nationality": "Switzerland"},
                {"name": "Takumi Minamino", "position": null, "dateOfBirth": "1995-01-16", "nationality": "Japan"}
            ]
        }"#;
        let adapted = team(body, "team-548").unwrap();
        assert_eq!(adapted.team.shortname, "Monaco");
        assert_eq!(adapted.team.founded, Some(1919));
        assert_eq!(adapted.team.stadium.as_deref(), Some("Stade Louis II"));

        let coach = adapted.coach.unwrap().unwrap();
        assert_eq!(coach.team, "Monaco");
        assert_eq!(coach.birthdate.as_deref(), Some("1970-02-11"));

        assert_eq!(adapted.squad.len(), 2);
        assert_eq!(adapted.squad[0].as_ref().unwrap().position, "Goalkeeper");
        assert!(adapted.squad[1].is_err());
    }

    #[test]
    fn matchday_keeps_scores_and_raw_dates() {
        let body = r#"{
            "competition": {"code": "FL1", "name": "Ligue 1"},
            "matches": [{
                "utcDate": "2023-08-11T19:00:00Z",
                "homeTeam": {"shortName": "Nice"}, "awayTeam": {"shortName": "Lille"},
                "score": {"halfTime": {"home": 0, "away": 1}, "fullTime": {"home": 1, "away": 1}}
            }]
        }"#;
        let day = matchday(body, 2023, 1).unwrap();
        assert_eq!(day.league, LeagueName::Ligue1);
        let fixture = day.fixtures[0].as_ref().unwrap();
        assert_eq!(fixture.date, "2023-08-11T19:00:00Z");
        assert_eq!(fixture.score_halftime, Score { home: Some(0), away: Some(1) });
        assert_eq!(fixture.score.home, Some(1));
    }
}
