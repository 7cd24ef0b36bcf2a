//! French encyclopedia pages: season ranking tables, club infobox and coach
//! infobox.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{parse_int, slug, Adapted, ClubLink, Origin, RawCoach, RawRanking, RawTeam};
use crate::error::MalformedSource;
use crate::model::{LeagueName, RankingType};

const SOURCE: &str = "wiki";

fn selector(css: &str) -> Result<Selector, MalformedSource> {
    Selector::parse(css).map_err(|e| MalformedSource::new(SOURCE, css, format!("bad selector: {}", e)))
}

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .replace('\u{a0}', " ")
        .trim()
        .to_string()
}

/// Coach cell of a club infobox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoachRef {
    /// Link to the coach's own page.
    Page { href: String, name: String },
    /// Plain text when the page has no link.
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawClub {
    pub team: RawTeam,
    pub coach: Option<CoachRef>,
}

/// One parsed ranking row plus the club link it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankingRow {
    pub ranking: RawRanking,
    pub club: ClubLink,
}

/// Season page ranking tables (`table.gauche`, rows `tr.notheme`), laid out as
/// overall, home and away in page order.
pub fn rankings(html: &str, league: LeagueName, season: i32) -> Adapted<RankingRow> {
    let document = Html::parse_document(html);
    let table_selector = selector("table.gauche")?;
    let row_selector = selector("tr.notheme")?;
    let td_selector = selector("td")?;
    let link_selector = selector("a")?;
    let bold_selector = selector("b")?;

    let tables: Vec<_> = document.select(&table_selector).collect();
    if tables.is_empty() {
        return Err(MalformedSource::new(
            SOURCE,
            format!("rankings {}", season),
            "no ranking table",
        ));
    }

    let mut records = Vec::new();
    for (table, kind) in tables.into_iter().zip(RankingType::PAGE_ORDER) {
        for (index, row) in table.select(&row_selector).enumerate() {
            let key = format!("{} {} {} row {}", league, season, kind, index + 1);
            let mut club = None;
            let mut values = Vec::new();

            for td in row.select(&td_selector) {
                if let Some(link) = td.select(&link_selector).next() {
                    if club.is_none() {
                        club = Some(ClubLink {
                            href: link.value().attr("href").unwrap_or_default().to_string(),
                            title: link.value().attr("title").unwrap_or_default().to_string(),
                            text: text_of(link),
                        });
                    }
                } else if let Some(bold) = td.select(&bold_selector).next() {
                    values.push(text_of(bold));
                } else {
                    values.push(text_of(td));
                }
            }

            records.push(ranking_row(&key, club, &values, league, season, kind));
        }
    }
    Ok(records)
}

fn ranking_row(
    key: &str,
    club: Option<ClubLink>,
    values: &[String],
    league: LeagueName,
    season: i32,
    kind: RankingType,
) -> Result<RankingRow, MalformedSource> {
    let club = club
        .filter(|c| !c.text.is_empty())
        .ok_or_else(|| MalformedSource::new(SOURCE, key, "no club link"))?;
    // position, points, played, won, draw, lost, goals for, goals against[, diff]
    if values.len() < 8 {
        return Err(MalformedSource::new(
            SOURCE,
            key,
            format!("expected 8 numeric cells, found {}", values.len()),
        ));
    }
    let number = |i: usize, field: &str| {
        parse_int(&values[i]).ok_or_else(|| MalformedSource::new(SOURCE, key, format!("{} is not a number: {:?}", field, values[i])))
    };

    Ok(RankingRow {
        ranking: RawRanking {
            origin: Origin::Scraped,
            league,
            season,
            kind,
            team: club.text.clone(),
            position: number(0, "position")?,
            points: number(1, "points")?,
            played: number(2, "played")?,
            won: number(3, "won")?,
            draw: number(4, "draw")?,
            lost: number(5, "lost")?,
            goals_for: number(6, "goals for")?,
            goals_against: number(7, "goals against")?,
        },
        club,
    })
}

/// Find the infobox value cell whose header contains `label`.
fn infobox_cell<'a>(infobox: ElementRef<'a>, label: &str) -> Result<Option<ElementRef<'a>>, MalformedSource> {
    let row_selector = selector("tr")?;
    let th_selector = selector("th")?;
    let td_selector = selector("td")?;

    for row in infobox.select(&row_selector) {
        let Some(th) = row.select(&th_selector).next() else {
            continue;
        };
        if text_of(th).contains(label) {
            return Ok(row.select(&td_selector).next());
        }
    }
    Ok(None)
}

/// Club page infobox (`div.infobox_v3`): founding year, stadium and coach.
pub fn club(html: &str, link: &ClubLink) -> Result<RawClub, MalformedSource> {
    let key = link.slug();
    let document = Html::parse_document(html);
    let infobox_selector = selector("div.infobox_v3")?;
    let infobox = document
        .select(&infobox_selector)
        .next()
        .ok_or_else(|| MalformedSource::new(SOURCE, key.as_str(), "no infobox"))?;

    let year = Regex::new(r"[0-9]{4}").map_err(|e| MalformedSource::new(SOURCE, key.as_str(), e.to_string()))?;
    let founded = infobox_cell(infobox, "Fondation")?
        .map(text_of)
        .and_then(|text| year.find(&text).and_then(|m| m.as_str().parse().ok()));
    let stadium = infobox_cell(infobox, "Stade")?.map(text_of).filter(|s| !s.is_empty());
    let coach = match infobox_cell(infobox, "Entraîneur")? {
        Some(cell) => coach_ref(cell)?,
        None => None,
    };

    let name = if link.title.is_empty() { link.text.clone() } else { link.title.clone() };
    Ok(RawClub {
        team: RawTeam {
            origin: Origin::Scraped,
            name,
            shortname: link.text.clone(),
            stadium,
            founded,
        },
        coach,
    })
}

fn coach_ref(cell: ElementRef<'_>) -> Result<Option<CoachRef>, MalformedSource> {
    let link_selector = selector("a[href]")?;
    // The cell usually holds a flag (file link) followed by the coach link.
    let person = cell.select(&link_selector).find(|a| {
        a.value()
            .attr("href")
            .is_some_and(|h| h.starts_with("/wiki/") && !h.contains("Fichier:") && !h.contains("File:"))
    });

    if let Some(link) = person {
        let href = link.value().attr("href").unwrap_or_default().to_string();
        return Ok(Some(CoachRef::Page {
            href,
            name: text_of(link),
        }));
    }

    let text = text_of(cell);
    Ok((!text.is_empty()).then_some(CoachRef::Name(text)))
}

/// Coach page infobox: birth date from `<time datetime>` in the `Naissance`
/// row, nationality text from the `Nationalité` row.
pub fn coach(html: &str, team: &str, href: &str, link_text: &str) -> Result<RawCoach, MalformedSource> {
    let key = slug(href);
    let document = Html::parse_document(html);
    let infobox_selector = selector(".infobox, .infobox_v3")?;
    let heading_selector = selector("h1#firstHeading, h1")?;
    let time_selector = selector("time[datetime]")?;

    let name = document
        .select(&heading_selector)
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| link_text.to_string());
    if name.is_empty() {
        return Err(MalformedSource::new(SOURCE, key, "no coach name"));
    }

    let infobox = document
        .select(&infobox_selector)
        .next()
        .ok_or_else(|| MalformedSource::new(SOURCE, key.as_str(), "no infobox"))?;

    let birthdate = infobox_cell(infobox, "Naissance")?
        .and_then(|cell| cell.select(&time_selector).next())
        .and_then(|time| time.value().attr("datetime"))
        .map(str::to_string);

    let nationality = infobox_cell(infobox, "Nationalité")?.map(|cell| {
        cell.text()
            .map(|t| t.replace('\u{a0}', " ").trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    });

    Ok(RawCoach {
        origin: Origin::Scraped,
        team: team.to_string(),
        name,
        birthdate,
        nationality: nationality.filter(|n| !n.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANKINGS: &str = r#"
        <html><body>
        <table class="wikitable gauche">
          <tr><th>Rang</th><th>Équipe</th><th>Pts</th></tr>
          <tr class="notheme">
            <td>1</td>
            <td><a href="/wiki/AJ_Auxerre" title="Association de la jeunesse auxerroise">AJ Auxerre</a></td>
            <td><span style="display:none">0</span><b>72</b></td>
            <td>38</td><td>21</td><td>9</td><td>8</td><td>63</td><td>35</td><td>+28</td>
          </tr>
          <tr class="notheme">
            <td>2</td>
            <td><a href="/wiki/Angers_SCO" title="Angers SCO">Angers SCO</a></td>
            <td><b>68</b></td>
            <td>38</td><td>20</td><td>8</td><td>10</td><td>54</td><td>38</td><td>+16</td>
          </tr>
        </table>
        <table class="wikitable gauche">
          <tr class="notheme">
            <td>1</td>
            <td><a href="/wiki/AJ_Auxerre" title="Association de la jeunesse auxerroise">AJ Auxerre</a></td>
            <td><b>41</b></td>
            <td>19</td><td>13</td><td>2</td><td>4</td><td>38</td><td>15</td><td>+23</td>
          </tr>
          <tr class="notheme"><td>2</td><td>no link</td></tr>
        </table>
        </body></html>"#;

    #[test]
    fn ranking_tables_follow_page_order() {
        let records = rankings(RANKINGS, LeagueName::Ligue2, 2023).unwrap();
        assert_eq!(records.len(), 4);

        let first = records[0].as_ref().unwrap();
        assert_eq!(first.club.href, "/wiki/AJ_Auxerre");
        assert_eq!(first.club.title, "Association de la jeunesse auxerroise");
        assert_eq!(first.ranking.team, "AJ Auxerre");
        assert_eq!(first.ranking.kind, RankingType::Total);
        assert_eq!(
            (first.ranking.points, first.ranking.played, first.ranking.goals_against),
            (72, 38, 35)
        );

        let home = records[2].as_ref().unwrap();
        assert_eq!(home.ranking.kind, RankingType::Home);
        assert_eq!(home.ranking.points, 41);

        assert!(records[3].is_err());
    }

    #[test]
    fn page_without_tables_is_malformed() {
        assert!(rankings("<html><p>rien</p></html>", LeagueName::Ligue2, 2023).is_err());
    }

    const CLUB: &str = r#"
        <div class="infobox_v3">
          <table>
            <tr><th>Fondation</th><td>1 avril 1905 (118 ans)</td></tr>
            <tr><th><a href="/wiki/Stade">Stade</a></th><td>Stade de l'Abbé-Deschamps (18 541 places)</td></tr>
            <tr><th><a href="/wiki/Entra%C3%AEneur">Entraîneur</a></th>
                <td><span class="flagicon"><a href="/wiki/Fichier:Flag_of_France.svg">Fr</a></span>
                    <a href="/wiki/Christophe_Pélissier" title="Christophe Pélissier">Christophe Pélissier</a></td></tr>
          </table>
        </div>"#;

    #[test]
    fn club_infobox() {
        let link = ClubLink {
            href: "/wiki/AJ_Auxerre".into(),
            title: "Association de la jeunesse auxerroise".into(),
            text: "AJ Auxerre".into(),
        };
        let club = club(CLUB, &link).unwrap();
        assert_eq!(club.team.founded, Some(1905));
        assert_eq!(club.team.name, "Association de la jeunesse auxerroise");
        assert_eq!(club.team.shortname, "AJ Auxerre");
        assert_eq!(club.team.stadium.as_deref(), Some("Stade de l'Abbé-Deschamps (18 541 places)"));
        assert_eq!(
            club.coach,
            Some(CoachRef::Page {
                href: "/wiki/Christophe_Pélissier".into(),
                name: "Christophe Pélissier".into()
            })
        );
    }

    #[test]
    fn coach_infobox() {
        let html = r#"
            <h1 id="firstHeading">Christophe Pélissier</h1>
            <table class="infobox">
              <tr><th>Naissance</th><td><time class="nowrap" datetime="1965-10-05">5 octobre 1965</time></td></tr>
              <tr><th><span>Nationalité</span></th><td><span class="flagicon"></span>&nbsp;Française</td></tr>
            </table>"#;
        let coach = coach(html, "AJ Auxerre", "/wiki/Christophe_Pélissier", "Christophe Pélissier").unwrap();
        assert_eq!(coach.name, "Christophe Pélissier");
        assert_eq!(coach.team, "AJ Auxerre");
        assert_eq!(coach.birthdate.as_deref(), Some("1965-10-05"));
        assert_eq!(coach.nationality.as_deref(), Some("Française"));
    }
}
