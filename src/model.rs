//! Canonical entities and the persisted vocabularies.
//!
//! The string forms returned by `as_str()` are read by the query API and must
//! not change.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_COUNTRY: &str = "France";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub i64);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Team({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeagueId(pub i64);

impl fmt::Display for LeagueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "League({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

impl Position {
    pub const ALL: [Position; 4] = [
        Position::Goalkeeper,
        Position::Defender,
        Position::Midfielder,
        Position::Forward,
    ];

    /// Persisted value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Goalkeeper => "Gardien",
            Position::Defender => "Defenseur",
            Position::Midfielder => "Milieu",
            Position::Forward => "Attaquant",
        }
    }

    pub fn from_persisted(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RankingType {
    Total,
    Home,
    Away,
}

impl RankingType {
    /// Order in which the encyclopedia page lays out its ranking tables.
    pub const PAGE_ORDER: [RankingType; 3] = [RankingType::Total, RankingType::Home, RankingType::Away];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankingType::Total => "TOTAL",
            RankingType::Home => "HOME",
            RankingType::Away => "AWAY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TOTAL" => Some(RankingType::Total),
            "HOME" => Some(RankingType::Home),
            "AWAY" => Some(RankingType::Away),
            _ => None,
        }
    }
}

impl fmt::Display for RankingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LeagueName {
    #[serde(rename = "Ligue 1")]
    Ligue1,
    #[serde(rename = "Ligue 2")]
    Ligue2,
}

impl LeagueName {
    pub const ALL: [LeagueName; 2] = [LeagueName::Ligue1, LeagueName::Ligue2];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeagueName::Ligue1 => "Ligue 1",
            LeagueName::Ligue2 => "Ligue 2",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let compact: String = value
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match compact.as_str() {
            "ligue1" | "fl1" => Some(LeagueName::Ligue1),
            "ligue2" | "fl2" => Some(LeagueName::Ligue2),
            _ => None,
        }
    }
}

impl fmt::Display for LeagueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Staff role. Only coaches are ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StaffRole {
    Coach,
}

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Coach => "Entraineur",
        }
    }
}

/// Season label used by match documents, e.g. `2023-2024`.
pub fn season_label(season: i32) -> String {
    format!("{}-{}", season, season + 1)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: String,
    pub shortname: String,
    pub stadium: String,
    pub founded: Option<i32>,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub first_name: String,
    pub last_name: String,
    pub birthdate: NaiveDate,
    pub nationality: String,
    pub position: Position,
    pub team_id: TeamId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
    pub first_name: String,
    pub last_name: String,
    pub birthdate: Option<NaiveDate>,
    pub nationality: String,
    pub role: StaffRole,
    pub team_id: TeamId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct League {
    pub name: LeagueName,
    pub season: i32,
    pub country: String,
}

impl League {
    pub fn new(name: LeagueName, season: i32) -> Self {
        Self {
            name,
            season,
            country: DEFAULT_COUNTRY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub team_id: TeamId,
    pub league_id: LeagueId,
    pub kind: RankingType,
    pub position: i32,
    pub points: i32,
    pub played: i32,
    pub won: i32,
    pub draw: i32,
    pub lost: i32,
    pub goals_for: i32,
    pub goals_against: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: Option<i32>,
    pub away: Option<i32>,
}

/// Team reference inside a fixture; `id` is filled by the patch phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: Option<i64>,
    pub name: String,
}

impl TeamRef {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub date: NaiveDate,
    pub home_team: TeamRef,
    pub away_team: TeamRef,
    pub score_halftime: Score,
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDocument {
    pub league: String,
    pub season: String,
    pub matchday: u32,
    pub matches: Vec<Fixture>,
}

impl MatchDocument {
    pub fn key(&self) -> MatchKey {
        MatchKey {
            league: self.league.clone(),
            season: self.season.clone(),
            matchday: self.matchday,
        }
    }
}

/// Natural key of a match document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchKey {
    pub league: String,
    pub season: String,
    pub matchday: u32,
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} J{}", self.league, self.season, self.matchday)
    }
}

/// Outcome of an idempotent upsert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertCount {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertCount {
    pub fn total(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn record(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.updated += 1;
        }
    }
}
