//! Squad tables exported to CSV from club pages.
//!
//! Every body cell is a `(text, link)` tuple literal, e.g.
//! `('Brice Samba', '/wiki/Brice_Samba')` or `('G', None)`.

use super::{Adapted, Origin, RawPlayer};
use crate::error::MalformedSource;

const SOURCE: &str = "squad";

const POSITION_COLUMN: &str = "P.";
const NATIONALITY_COLUMN: &str = "Nat.";
const NAME_COLUMN: &str = "Nom";
const BIRTHDATE_COLUMN: &str = "Date de naissance";

/// Players of one club. `team` is the club's short name, `key` names the file.
pub fn squad(body: &str, team: &str, key: &str) -> Adapted<RawPlayer> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| MalformedSource::new(SOURCE, key, format!("unreadable header: {}", e)))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| MalformedSource::new(SOURCE, key, format!("missing column {:?}", name)))
    };
    let position_idx = column(POSITION_COLUMN)?;
    let nationality_idx = column(NATIONALITY_COLUMN)?;
    let name_idx = column(NAME_COLUMN)?;
    let birthdate_idx = column(BIRTHDATE_COLUMN)?;

    let mut records = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let row_key = format!("{} line {}", key, line + 2);
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                records.push(Err(MalformedSource::new(SOURCE, row_key, e.to_string())));
                continue;
            }
        };

        let cell = |idx: usize| row.get(idx).map(parse_cell).unwrap_or_default();
        let (name, _) = cell(name_idx);
        // Section separators and empty rows carry no player.
        if name.trim().is_empty() {
            continue;
        }
        let row_key = format!("{} / {}", key, name.trim());

        let (position, _) = cell(position_idx);
        let (_, flag) = cell(nationality_idx);
        let (birthdate, _) = cell(birthdate_idx);

        let nationality = match flag.as_deref().and_then(flag_country) {
            Some(country) => country,
            None => {
                records.push(Err(MalformedSource::new(SOURCE, row_key, "no flag link in Nat. cell")));
                continue;
            }
        };
        if position.trim().is_empty() || birthdate.trim().is_empty() {
            records.push(Err(MalformedSource::new(SOURCE, row_key, "missing position or birth date")));
            continue;
        }

        records.push(Ok(RawPlayer {
            origin: Origin::Scraped,
            team: team.to_string(),
            name,
            birthdate,
            nationality,
            position,
        }));
    }
    Ok(records)
}

/// `/wiki/Fichier:Flag_of_Senegal.svg` -> `Senegal`,
/// `Flag_of_Cura%C3%A7ao.svg` -> `Curaçao`.
fn flag_country(link: &str) -> Option<String> {
    let (_, rest) = link.split_once("Flag_of_")?;
    let name = rest.rsplit_once('.').map_or(rest, |(stem, _)| stem);
    if name.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(name).map_or_else(|_| name.to_string(), |d| d.into_owned());
    Some(decoded.replace('_', " "))
}

/// Parse a `(text, link)` tuple literal. Anything else is taken as plain text.
pub fn parse_cell(raw: &str) -> (String, Option<String>) {
    parse_tuple(raw.trim()).unwrap_or_else(|| (raw.trim().to_string(), None))
}

fn parse_tuple(raw: &str) -> Option<(String, Option<String>)> {
    let inner = raw.strip_prefix('(')?.strip_suffix(')')?;
    let mut chars = inner.chars().peekable();

    let text = parse_literal(&mut chars)?;
    skip_whitespace(&mut chars);
    if chars.next()? != ',' {
        return None;
    }
    skip_whitespace(&mut chars);

    let link = if chars.peek() == Some(&'N') {
        let word: String = chars.by_ref().take(4).collect();
        if word != "None" {
            return None;
        }
        None
    } else {
        Some(parse_literal(&mut chars)?)
    };
    skip_whitespace(&mut chars);
    chars.next().is_none().then_some((text, link))
}

fn skip_whitespace(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

/// Quoted string literal with backslash escapes (`\'`, `\\`, `\xa0`, `é`).
fn parse_literal(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<String> {
    let quote = chars.next().filter(|c| *c == '\'' || *c == '"')?;
    let mut out = String::new();
    loop {
        match chars.next()? {
            c if c == quote => return Some(out),
            '\\' => match chars.next()? {
                'x' => out.push(hex_escape(chars, 2)?),
                'u' => out.push(hex_escape(chars, 4)?),
                'U' => out.push(hex_escape(chars, 8)?),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                other => out.push(other),
            },
            c => out.push(c),
        }
    }
}

fn hex_escape(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, digits: usize) -> Option<char> {
    let hex: String = chars.by_ref().take(digits).collect();
    if hex.len() != digits {
        return None;
    }
    u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
}
