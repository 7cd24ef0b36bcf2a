#![allow(dead_code)]

use league_ingestion::sources::snapshot::{MatchdayPayload, NamedPayload, SeasonPayload};
use league_ingestion::sources::SourceBundle;
use league_ingestion::store::{Gateways, MemoryDocumentStore, MemoryRelationalStore};
use league_ingestion::{Config, Pipeline};
use std::sync::Arc;

pub struct Harness {
    pub pipeline: Pipeline,
    pub relational: Arc<MemoryRelationalStore>,
    pub documents: Arc<MemoryDocumentStore>,
}

pub fn harness() -> Harness {
    harness_with(Config::default())
}

pub fn harness_with(config: Config) -> Harness {
    let (gateways, relational, documents) = Gateways::in_memory();
    Harness {
        pipeline: Pipeline::new(&config, gateways),
        relational,
        documents,
    }
}

pub fn api_standings(season: i32, rows: &[(&str, i32, i32)]) -> SeasonPayload {
    let table: Vec<String> = rows
        .iter()
        .map(|(team, position, points)| {
            format!(
                r#"{{"position": {}, "team": {{"shortName": "{}"}}, "playedGames": 38, "won": 10,
                    "draw": 8, "lost": 20, "points": {}, "goalsFor": 40, "goalsAgainst": 55}}"#,
                position, team, points
            )
        })
        .collect();
    SeasonPayload {
        season,
        body: format!(
            r#"{{"competition": {{"code": "FL1", "name": "Ligue 1"}},
                 "standings": [{{"type": "TOTAL", "table": [{}]}}]}}"#,
            table.join(",")
        ),
    }
}

/// `players` are (name, position, birth date, nationality).
pub fn api_team(short_name: &str, coach: &str, players: &[(&str, &str, &str, &str)]) -> NamedPayload {
    let squad: Vec<String> = players
        .iter()
        .map(|(name, position, birthdate, nationality)| {
            format!(
                r#"{{"name": "{}", "position": "{}", "dateOfBirth": "{}", "nationality": "{}"}}"#,
                name, position, birthdate, nationality
            )
        })
        .collect();
    NamedPayload {
        name: format!("team-{}", short_name.replace(' ', "_")),
        body: format!(
            r#"{{"name": "{0} Club", "shortName": "{0}", "venue": "Stade {0}", "founded": 1906,
                 "coach": {{"name": "{1}", "dateOfBirth": "1973-04-15", "nationality": "France"}},
                 "squad": [{2}]}}"#,
            short_name,
            coach,
            squad.join(",")
        ),
    }
}

/// Ligue 2 season page with one overall table; `clubs` are (slug, short name, points).
pub fn wiki_rankings(season: i32, clubs: &[(&str, &str, i32)]) -> SeasonPayload {
    let rows: Vec<String> = clubs
        .iter()
        .enumerate()
        .map(|(index, (slug, name, points))| {
            format!(
                r#"<tr class="notheme"><td>{}</td>
                   <td><a href="/wiki/{}" title="{} (football)">{}</a></td>
                   <td><b>{}</b></td><td>38</td><td>15</td><td>10</td><td>13</td><td>50</td><td>45</td><td>+5</td></tr>"#,
                index + 1,
                slug,
                name,
                name,
                points
            )
        })
        .collect();
    SeasonPayload {
        season,
        body: format!(
            r#"<html><body><table class="wikitable gauche">
               <tr><th>Rang</th><th>Équipe</th><th>Pts</th></tr>{}</table></body></html>"#,
            rows.join("\n")
        ),
    }
}

pub fn club_page(founded: i32, stadium: &str, coach_slug: Option<&str>) -> String {
    let coach = coach_slug
        .map(|slug| {
            format!(
                r#"<tr><th>Entraîneur</th><td><span class="flagicon"><a href="/wiki/Fichier:Flag_of_France.svg">Fr</a></span>
                   <a href="/wiki/{0}" title="{0}">{0}</a></td></tr>"#,
                slug
            )
        })
        .unwrap_or_default();
    format!(
        r#"<div class="infobox_v3"><table>
           <tr><th>Fondation</th><td>{} </td></tr>
           <tr><th>Stade</th><td>{} (20 000 places)</td></tr>{}
           </table></div>"#,
        founded, stadium, coach
    )
}

pub fn coach_page(name: &str, born: &str, nationality: &str) -> String {
    format!(
        r#"<h1 id="firstHeading">{}</h1>
           <table class="infobox">
             <tr><th>Naissance</th><td><time datetime="{}">né</time></td></tr>
             <tr><th>Nationalité</th><td><span class="flagicon"></span>&nbsp;{}</td></tr>
           </table>"#,
        name, born, nationality
    )
}

/// `players` are (position code, flag country, name, DD/MM/YYYY).
pub fn squad_csv(players: &[(&str, &str, &str, &str)]) -> String {
    let mut body = String::from(",N°,P.,Nat.,Nom,Date de naissance\n");
    for (index, (position, country, name, birthdate)) in players.iter().enumerate() {
        body.push_str(&format!(
            "{0},\"('{0}', None)\",\"('{1}', None)\",\"('', '/wiki/Fichier:Flag_of_{2}.svg')\",\"('{3}', '/wiki/x')\",\"('{4}\\xa0(25\\xa0ans)', None)\"\n",
            index, position, country, name, birthdate
        ));
    }
    body
}

pub fn api_matchday(season: i32, matchday: u32, games: &[(&str, &str, i32, i32)]) -> MatchdayPayload {
    let matches: Vec<String> = games
        .iter()
        .map(|(home, away, h, a)| {
            format!(
                r#"{{"utcDate": "{}-08-13T19:00:00Z", "homeTeam": {{"shortName": "{}"}},
                    "awayTeam": {{"shortName": "{}"}},
                    "score": {{"halfTime": {{"home": 0, "away": 0}}, "fullTime": {{"home": {}, "away": {}}}}}}}"#,
                season, home, away, h, a
            )
        })
        .collect();
    MatchdayPayload {
        season,
        matchday,
        body: format!(
            r#"{{"competition": {{"code": "FL1", "name": "Ligue 1"}}, "matches": [{}]}}"#,
            matches.join(",")
        ),
    }
}

pub fn results_page(season: i32, matchday: u32, date: &str, games: &[(&str, &str, &str)]) -> MatchdayPayload {
    let rows: Vec<String> = games
        .iter()
        .map(|(home, score, away)| format!("<tr><td>{}</td><td>{}</td><td>{}</td></tr>", home, score, away))
        .collect();
    MatchdayPayload {
        season,
        matchday,
        body: format!(
            r#"<table><thead><tr><th colspan="3">{}</th></tr></thead><tbody>{}</tbody></table>"#,
            date,
            rows.join("")
        ),
    }
}

/// Two seasons across every source:
/// * API: Lens (kept) and Le Havre (excluded), Ligue 1 2023 standings and one matchday
/// * scraped: Le Havre, Paris FC and US Quevilly-Rouen from the 2022 Ligue 2
///   page, Paris FC's coach and squad, one results page
pub fn snapshot() -> SourceBundle {
    let mut bundle = SourceBundle::default();

    bundle.api_standings.push(api_standings(2023, &[("Lens", 2, 84), ("Le Havre", 12, 43)]));
    bundle.api_teams.push(api_team(
        "Lens",
        "Franck Haise",
        &[
            ("Brice Samba", "Goalkeeper", "1994-04-25", "France"),
            ("Elye Wahi", "Offence", "2003-01-02", "France"),
        ],
    ));
    bundle.api_teams.push(api_team(
        "Le Havre",
        "Luka Elsner",
        &[("Arthur Desmas", "Goalkeeper", "1994-04-07", "France")],
    ));
    bundle.api_matchdays.push(api_matchday(2023, 1, &[("Lens", "Le Havre", 1, 1)]));

    bundle.wiki_rankings.push(wiki_rankings(
        2022,
        &[
            ("Le_Havre_AC", "Le Havre", 75),
            ("Paris_FC", "Paris FC", 60),
            ("US_Quevilly-Rouen_Métropole", "US Quevilly-Rouen", 44),
        ],
    ));
    bundle
        .club_pages
        .insert("Le_Havre_AC".into(), club_page(1872, "Stade Océane", None));
    bundle
        .club_pages
        .insert("Paris_FC".into(), club_page(1969, "Stade Charléty", Some("Thierry_Laurey")));
    bundle.club_pages.insert(
        "US_Quevilly-Rouen_Métropole".into(),
        club_page(1902, "Stade Robert-Diochon", None),
    );
    bundle
        .coach_pages
        .insert("Thierry_Laurey".into(), coach_page("Thierry Laurey", "1964-02-17", "Française"));
    bundle.squads.insert(
        "Paris_FC".into(),
        squad_csv(&[
            ("G", "France", "Obed Nkambadio", "21/12/2003"),
            ("M", "Algeria", "Ilan Kebbal", "10/07/1998"),
        ]),
    );

    bundle.result_pages.push(results_page(
        2022,
        1,
        "samedi 30 juillet 2022",
        &[("Paris FC", "2 - 1", "US Quevilly Rouen"), ("Le Havre", "0 - 0", "Paris FC")],
    ));

    bundle
}
