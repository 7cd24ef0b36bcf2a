//! On-disk snapshot of every raw payload the pipeline consumes.
//!
//! ```text
//! data/
//!   api/standings-2023.json        competition standings per season
//!   api/team-524.json              team + coach + squad
//!   api/matches-2023-12.json       fixtures per season and matchday
//!   wiki/rankings-2023.html        second division season page
//!   wiki/club/<slug>.html          club page, slug = last segment of its link
//!   wiki/coach/<slug>.html         coach page
//!   squads/<slug>.csv              squad export of a club
//!   results/2023-12.html           results site matchday page
//! ```

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonPayload {
    pub season: i32,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPayload {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchdayPayload {
    pub season: i32,
    pub matchday: u32,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct SourceBundle {
    pub api_standings: Vec<SeasonPayload>,
    pub api_teams: Vec<NamedPayload>,
    pub api_matchdays: Vec<MatchdayPayload>,
    pub wiki_rankings: Vec<SeasonPayload>,
    /// Keyed by slug.
    pub club_pages: BTreeMap<String, String>,
    pub coach_pages: BTreeMap<String, String>,
    pub squads: BTreeMap<String, String>,
    pub result_pages: Vec<MatchdayPayload>,
}

impl SourceBundle {
    pub fn load_dir(root: &Path) -> Result<Self> {
        let mut bundle = Self::default();

        for (stem, body) in read_files(&root.join("api"), "json")? {
            if let Some(season) = stem.strip_prefix("standings-").and_then(|s| s.parse().ok()) {
                bundle.api_standings.push(SeasonPayload { season, body });
            } else if stem.starts_with("team-") {
                bundle.api_teams.push(NamedPayload { name: stem, body });
            } else if let Some((season, matchday)) = stem.strip_prefix("matches-").and_then(season_matchday) {
                bundle.api_matchdays.push(MatchdayPayload { season, matchday, body });
            } else {
                warn!("Ignoring unrecognized API snapshot file {}.json", stem);
            }
        }

        for (stem, body) in read_files(&root.join("wiki"), "html")? {
            match stem.strip_prefix("rankings-").and_then(|s| s.parse().ok()) {
                Some(season) => bundle.wiki_rankings.push(SeasonPayload { season, body }),
                None => warn!("Ignoring unrecognized page {}.html", stem),
            }
        }
        bundle.club_pages = read_files(&root.join("wiki").join("club"), "html")?.into_iter().collect();
        bundle.coach_pages = read_files(&root.join("wiki").join("coach"), "html")?.into_iter().collect();
        bundle.squads = read_files(&root.join("squads"), "csv")?.into_iter().collect();

        for (stem, body) in read_files(&root.join("results"), "html")? {
            match season_matchday(&stem) {
                Some((season, matchday)) => bundle.result_pages.push(MatchdayPayload { season, matchday, body }),
                None => warn!("Ignoring unrecognized results page {}.html", stem),
            }
        }

        bundle.api_matchdays.sort_by_key(|p| (p.season, p.matchday));
        bundle.result_pages.sort_by_key(|p| (p.season, p.matchday));

        info!(
            "Loaded snapshot from {}: {} standings, {} teams, {} API matchdays, {} ranking pages, {} clubs, {} coaches, {} squads, {} results pages",
            root.display(),
            bundle.api_standings.len(),
            bundle.api_teams.len(),
            bundle.api_matchdays.len(),
            bundle.wiki_rankings.len(),
            bundle.club_pages.len(),
            bundle.coach_pages.len(),
            bundle.squads.len(),
            bundle.result_pages.len(),
        );
        Ok(bundle)
    }

    pub fn is_empty(&self) -> bool {
        self.api_standings.is_empty()
            && self.api_teams.is_empty()
            && self.api_matchdays.is_empty()
            && self.wiki_rankings.is_empty()
            && self.result_pages.is_empty()
    }
}

/// `2023-12` -> (2023, 12)
fn season_matchday(stem: &str) -> Option<(i32, u32)> {
    let (season, matchday) = stem.split_once('-')?;
    Some((season.parse().ok()?, matchday.parse().ok()?))
}

/// Files with the given extension directly under `dir`, sorted by name.
/// A missing directory yields nothing.
fn read_files(dir: &Path, extension: &str) -> Result<Vec<(String, String)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let body = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        files.push((stem.to_string(), body));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matchday_file_names() {
        assert_eq!(season_matchday("2023-12"), Some((2023, 12)));
        assert_eq!(season_matchday("2023"), None);
        assert_eq!(season_matchday("x-1"), None);
    }

    #[test]
    fn loads_layout_from_disk() {
        let root = std::env::temp_dir().join(format!("league-snapshot-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(root.join("api")).unwrap();
        std::fs::create_dir_all(root.join("wiki/club")).unwrap();
        std::fs::create_dir_all(root.join("results")).unwrap();
        std::fs::write(root.join("api/standings-2023.json"), "{}").unwrap();
        std::fs::write(root.join("api/team-524.json"), "{}").unwrap();
        std::fs::write(root.join("api/matches-2023-2.json"), "{}").unwrap();
        std::fs::write(root.join("api/matches-2023-1.json"), "{}").unwrap();
        std::fs::write(root.join("api/notes.txt"), "skip").unwrap();
        std::fs::write(root.join("wiki/rankings-2022.html"), "<table/>").unwrap();
        std::fs::write(root.join("wiki/club/Paris_FC.html"), "<div/>").unwrap();
        std::fs::write(root.join("results/2022-3.html"), "<table/>").unwrap();

        let bundle = tokio_test::assert_ok!(SourceBundle::load_dir(&root));
        assert_eq!(bundle.api_standings[0].season, 2023);
        assert_eq!(bundle.api_teams[0].name, "team-524");
        assert_eq!(
            bundle.api_matchdays.iter().map(|m| m.matchday).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(bundle.wiki_rankings[0].season, 2022);
        assert!(bundle.club_pages.contains_key("Paris_FC"));
        assert!(bundle.squads.is_empty());
        assert_eq!((bundle.result_pages[0].season, bundle.result_pages[0].matchday), (2022, 3));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
