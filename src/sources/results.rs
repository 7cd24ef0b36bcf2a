//! Sports-results site matchday pages: one table per match date, the header
//! cell holding the French long date, rows laid out as home | `h - a` | away.

use regex::Regex;
use scraper::{Html, Selector};

use super::{Origin, RawFixture, RawMatchday};
use crate::error::MalformedSource;
use crate::model::{LeagueName, Score};

const SOURCE: &str = "results";

fn selector(css: &str) -> Result<Selector, MalformedSource> {
    Selector::parse(css).map_err(|e| MalformedSource::new(SOURCE, css, format!("bad selector: {}", e)))
}

pub fn matchday(html: &str, league: LeagueName, season: i32, matchday: u32) -> Result<RawMatchday, MalformedSource> {
    let payload_key = format!("{} {} J{}", league, season, matchday);
    let document = Html::parse_document(html);
    let table_selector = selector("table")?;
    let header_selector = selector("th")?;
    let row_selector = selector("tr")?;
    let td_selector = selector("td")?;
    let score_pattern = Regex::new(r"(\d{1,2})\s*[-–]\s*(\d{1,2})")
        .map_err(|e| MalformedSource::new(SOURCE, payload_key.as_str(), e.to_string()))?;

    let tables: Vec<_> = document.select(&table_selector).collect();
    if tables.is_empty() {
        return Err(MalformedSource::new(SOURCE, payload_key, "no result table"));
    }

    let mut fixtures = Vec::new();
    for (table_index, table) in tables.into_iter().enumerate() {
        let date = table
            .select(&header_selector)
            .next()
            .map(|th| th.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        for row in table.select(&row_selector) {
            let cells: Vec<String> = row
                .select(&td_selector)
                .map(|td| td.text().collect::<String>().replace('\u{a0}', " ").trim().to_string())
                .collect();
            if cells.is_empty() {
                continue;
            }
            let key = format!("{} table {} {}", payload_key, table_index + 1, cells.join(" | "));

            if date.is_empty() {
                fixtures.push(Err(MalformedSource::new(SOURCE, key, "table has no date header")));
                continue;
            }
            if cells.len() < 3 || cells[0].is_empty() || cells[2].is_empty() {
                fixtures.push(Err(MalformedSource::new(SOURCE, key, "expected home | score | away")));
                continue;
            }

            // Fixtures not played yet show no score.
            let score = score_pattern
                .captures(&cells[1])
                .map(|c| Score {
                    home: c[1].parse().ok(),
                    away: c[2].parse().ok(),
                })
                .unwrap_or_default();

            fixtures.push(Ok(RawFixture {
                date: date.clone(),
                home_team: cells[0].clone(),
                away_team: cells[2].clone(),
                score_halftime: Score::default(),
                score,
            }));
        }
    }

    Ok(RawMatchday {
        origin: Origin::Scraped,
        league,
        season,
        matchday,
        fixtures,
    })
}
