//! Source adapters.
//!
//! Each adapter turns one raw payload into loosely typed records whose keys
//! are already in the target vocabulary but whose values are not normalized
//! yet. Nothing here touches the network or a store.

use serde::Serialize;

use crate::error::MalformedSource;
use crate::model::{LeagueName, RankingType, Score};
use crate::normalize::{PositionVocabulary, SourceLocale};

pub mod api;
pub mod fetch;
pub mod results;
pub mod snapshot;
pub mod squad;
pub mod wiki;

pub use fetch::Fetcher;
pub use snapshot::SourceBundle;

/// Records adapted from one payload. The outer `Err` means the whole payload
/// is unusable (error marker, missing table); inner errors skip one record.
pub type Adapted<T> = Result<Vec<Result<T, MalformedSource>>, MalformedSource>;

/// Where a record came from; decides which date and position vocabulary
/// the normalizer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Origin {
    /// Competition REST API (JSON).
    Api,
    /// Scraped encyclopedia pages, squad exports and results pages.
    Scraped,
}

impl Origin {
    pub fn locale(&self) -> SourceLocale {
        match self {
            Origin::Api => SourceLocale::Api,
            Origin::Scraped => SourceLocale::French,
        }
    }

    pub fn positions(&self) -> PositionVocabulary {
        match self {
            Origin::Api => PositionVocabulary::Api,
            Origin::Scraped => PositionVocabulary::ScrapedCode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTeam {
    pub origin: Origin,
    pub name: String,
    pub shortname: String,
    pub stadium: Option<String>,
    pub founded: Option<i32>,
}

/// Coach as found in a team payload or a coach page. `team` is the short
/// name the coach is attached to in that source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCoach {
    pub origin: Origin,
    pub team: String,
    pub name: String,
    pub birthdate: Option<String>,
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPlayer {
    pub origin: Origin,
    pub team: String,
    pub name: String,
    pub birthdate: String,
    pub nationality: String,
    pub position: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRanking {
    pub origin: Origin,
    pub league: LeagueName,
    pub season: i32,
    pub kind: RankingType,
    pub team: String,
    pub position: i32,
    pub points: i32,
    pub played: i32,
    pub won: i32,
    pub draw: i32,
    pub lost: i32,
    pub goals_for: i32,
    pub goals_against: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFixture {
    pub date: String,
    pub home_team: String,
    pub away_team: String,
    pub score_halftime: Score,
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatchday {
    pub origin: Origin,
    pub league: LeagueName,
    pub season: i32,
    pub matchday: u32,
    /// A broken fixture row is skipped without dropping the matchday.
    pub fixtures: Vec<Result<RawFixture, MalformedSource>>,
}

/// Club link from a ranking table cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClubLink {
    pub href: String,
    /// Full club name (`title` attribute).
    pub title: String,
    /// Short name (link text).
    pub text: String,
}

impl ClubLink {
    pub fn slug(&self) -> String {
        slug(&self.href)
    }
}

/// Last path segment of an encyclopedia link, used to name snapshot files.
pub fn slug(href: &str) -> String {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(href)
        .to_string()
}

/// Parse an integer cell, tolerating signs, nbsp and stray markup.
pub(crate) fn parse_int(raw: &str) -> Option<i32> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-' || *c == '+' || *c == '\u{2212}')
        .map(|c| if c == '\u{2212}' { '-' } else { c })
        .collect();
    cleaned.trim_start_matches('+').parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_use_last_segment() {
        assert_eq!(slug("/wiki/Paris_FC"), "Paris_FC");
        assert_eq!(slug("/wiki/Stade_Malherbe_Caen/"), "Stade_Malherbe_Caen");
        assert_eq!(slug("Rodez"), "Rodez");
    }

    #[test]
    fn integer_cells() {
        assert_eq!(parse_int(" 12\n"), Some(12));
        assert_eq!(parse_int("+7"), Some(7));
        assert_eq!(parse_int("\u{2212}3"), Some(-3));
        assert_eq!(parse_int("n/a"), None);
    }
}
