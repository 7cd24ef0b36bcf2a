//! Per-field cleanup rules applied between the source adapters and the
//! identity resolver. Every function is pure.

use chrono::NaiveDate;

use crate::error::NormalizeError;
use crate::model::Position;

/// How a source writes its dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLocale {
    /// Scraped French pages: `samedi 29 juillet 2023`, `29/07/2023`.
    French,
    /// JSON API: `2023-07-29` or `2023-07-29T19:00:00Z`.
    Api,
}

/// Position vocabulary of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionVocabulary {
    /// English names used by the competition API.
    Api,
    /// Single-letter codes from scraped squad tables.
    ScrapedCode,
}

const FRENCH_MONTHS: [(&str, u32); 14] = [
    ("janvier", 1),
    ("février", 2),
    ("fevrier", 2),
    ("mars", 3),
    ("avril", 4),
    ("mai", 5),
    ("juin", 6),
    ("juillet", 7),
    ("août", 8),
    ("aout", 8),
    ("septembre", 9),
    ("octobre", 10),
    ("novembre", 11),
    ("décembre", 12),
];

const FRENCH_WEEKDAYS: [&str; 7] = [
    "lundi", "mardi", "mercredi", "jeudi", "vendredi", "samedi", "dimanche",
];

pub const API_POSITIONS: &[(&str, Position)] = &[
    ("Goalkeeper", Position::Goalkeeper),
    ("Defence", Position::Defender),
    ("Defender", Position::Defender),
    ("Left-Back", Position::Defender),
    ("Right-Back", Position::Defender),
    ("Centre-Back", Position::Defender),
    ("Midfield", Position::Midfielder),
    ("Midfielder", Position::Midfielder),
    ("Right Midfield", Position::Midfielder),
    ("Left Midfield", Position::Midfielder),
    ("Attacking Midfield", Position::Midfielder),
    ("Defensive Midfield", Position::Midfielder),
    ("Central Midfield", Position::Midfielder),
    ("Offence", Position::Forward),
    ("Attacker", Position::Forward),
    ("Forward", Position::Forward),
    ("Centre-Forward", Position::Forward),
    ("Right Winger", Position::Forward),
    ("Left Winger", Position::Forward),
];

pub const SCRAPED_POSITIONS: &[(&str, Position)] = &[
    ("G", Position::Goalkeeper),
    ("D", Position::Defender),
    ("M", Position::Midfielder),
    ("A", Position::Forward),
];

/// Multi-word and encoded forms that the demonym table cannot express.
const NATIONALITY_OVERRIDES: &[(&str, &str)] = &[
    ("C%C3%B4te d%27Ivoire", "Ivory Coast"),
    ("Côte d'Ivoire", "Ivory Coast"),
    ("Cote d'Ivoire", "Ivory Coast"),
    ("the Democratic Republic of the Congo", "DR Congo"),
    ("Democratic Republic of the Congo", "DR Congo"),
    ("the Republic of the Congo", "Congo"),
    ("Republic of the Congo", "Congo"),
];

const FRENCH_DEMONYMS: &[(&str, &str)] = &[
    ("français", "France"),
    ("française", "France"),
    ("sénégalais", "Senegal"),
    ("sénégalaise", "Senegal"),
    ("portugais", "Portugal"),
    ("portugaise", "Portugal"),
    ("marocain", "Morocco"),
    ("marocaine", "Morocco"),
    ("norvégien", "Norway"),
    ("norvégienne", "Norway"),
    ("algérien", "Algeria"),
    ("algérienne", "Algeria"),
    ("tunisien", "Tunisia"),
    ("tunisienne", "Tunisia"),
    ("ivoirien", "Ivory Coast"),
    ("ivoirienne", "Ivory Coast"),
    ("camerounais", "Cameroon"),
    ("camerounaise", "Cameroon"),
    ("malien", "Mali"),
    ("malienne", "Mali"),
    ("guinéen", "Guinea"),
    ("guinéenne", "Guinea"),
    ("congolais", "Congo"),
    ("congolaise", "Congo"),
    ("gabonais", "Gabon"),
    ("gabonaise", "Gabon"),
    ("béninois", "Benin"),
    ("béninoise", "Benin"),
    ("togolais", "Togo"),
    ("togolaise", "Togo"),
    ("burkinabé", "Burkina Faso"),
    ("burkinabée", "Burkina Faso"),
    ("comorien", "Comoros"),
    ("comorienne", "Comoros"),
    ("malgache", "Madagascar"),
    ("capverdien", "Cape Verde"),
    ("capverdienne", "Cape Verde"),
    ("mauritanien", "Mauritania"),
    ("mauritanienne", "Mauritania"),
    ("ghanéen", "Ghana"),
    ("ghanéenne", "Ghana"),
    ("nigérian", "Nigeria"),
    ("nigériane", "Nigeria"),
    ("haïtien", "Haiti"),
    ("haïtienne", "Haiti"),
    ("belge", "Belgium"),
    ("suisse", "Switzerland"),
    ("luxembourgeois", "Luxembourg"),
    ("luxembourgeoise", "Luxembourg"),
    ("espagnol", "Spain"),
    ("espagnole", "Spain"),
    ("italien", "Italy"),
    ("italienne", "Italy"),
    ("allemand", "Germany"),
    ("allemande", "Germany"),
    ("néerlandais", "Netherlands"),
    ("néerlandaise", "Netherlands"),
    ("anglais", "England"),
    ("anglaise", "England"),
    ("danois", "Denmark"),
    ("danoise", "Denmark"),
    ("suédois", "Sweden"),
    ("suédoise", "Sweden"),
    ("polonais", "Poland"),
    ("polonaise", "Poland"),
    ("croate", "Croatia"),
    ("serbe", "Serbia"),
    ("grec", "Greece"),
    ("grecque", "Greece"),
    ("turc", "Turkey"),
    ("turque", "Turkey"),
    ("ukrainien", "Ukraine"),
    ("ukrainienne", "Ukraine"),
    ("arménien", "Armenia"),
    ("arménienne", "Armenia"),
    ("géorgien", "Georgia"),
    ("géorgienne", "Georgia"),
    ("brésilien", "Brazil"),
    ("brésilienne", "Brazil"),
    ("argentin", "Argentina"),
    ("argentine", "Argentina"),
    ("uruguayen", "Uruguay"),
    ("uruguayenne", "Uruguay"),
    ("colombien", "Colombia"),
    ("colombienne", "Colombia"),
    ("américain", "United States"),
    ("américaine", "United States"),
    ("canadien", "Canada"),
    ("canadienne", "Canada"),
    ("japonais", "Japan"),
    ("japonaise", "Japan"),
    ("coréen", "South Korea"),
    ("coréenne", "South Korea"),
    ("martiniquais", "Martinique"),
    ("martiniquaise", "Martinique"),
    ("guadeloupéen", "Guadeloupe"),
    ("guadeloupéenne", "Guadeloupe"),
    ("centrafricain", "Central African Republic"),
    ("centrafricaine", "Central African Republic"),
    ("égyptien", "Egypt"),
];

/// Canonical English country names already accepted as-is.
const COUNTRIES: &[&str] = &[
    "Albania", "Algeria", "Angola", "Argentina", "Armenia", "Australia", "Austria",
    "Belgium", "Benin", "Bosnia-Herzegovina", "Brazil", "Bulgaria", "Burkina Faso",
    "Burundi", "Cameroon", "Canada", "Cape Verde", "Cape Verde Islands",
    "Central African Republic", "Chad", "Chile", "China PR", "Colombia", "Comoros",
    "Congo", "Costa Rica", "Croatia", "Curaçao", "Cyprus", "Czech Republic",
    "Czechia", "Denmark", "DR Congo", "Ecuador", "Egypt", "England",
    "Equatorial Guinea", "Estonia", "Finland", "France", "French Guiana", "Gabon",
    "Gambia", "Georgia", "Germany", "Ghana", "Greece", "Guadeloupe", "Guinea",
    "Guinea-Bissau", "Haiti", "Hungary", "Iceland", "Iran", "Ireland", "Israel",
    "Italy", "Ivory Coast", "Jamaica", "Japan", "Kosovo", "Luxembourg", "Madagascar",
    "Mali", "Martinique", "Mauritania", "Mexico", "Montenegro", "Morocco",
    "Netherlands", "New Caledonia", "Nigeria", "North Macedonia", "Northern Ireland",
    "Norway", "Paraguay", "Peru", "Poland", "Portugal", "Romania", "Russia",
    "Scotland", "Senegal", "Serbia", "Slovakia", "Slovenia", "South Korea", "Spain",
    "Sweden", "Switzerland", "Togo", "Tunisia", "Turkey", "Ukraine", "United States",
    "Uruguay", "USA", "Venezuela", "Wales", "Zambia", "Zimbabwe",
];

/// Parse a source date into an ISO calendar date.
pub fn normalize_date(raw: &str, locale: SourceLocale) -> Result<NaiveDate, NormalizeError> {
    let cleaned = strip_markup(raw);
    let parsed = match locale {
        SourceLocale::French => parse_french_long(&cleaned)
            .or_else(|| parse_slash(&cleaned))
            .or_else(|| parse_iso(&cleaned)),
        SourceLocale::Api => parse_iso(&cleaned).or_else(|| parse_slash(&cleaned)),
    };
    parsed.ok_or_else(|| NormalizeError::DateFormat(raw.to_string()))
}

fn parse_iso(s: &str) -> Option<NaiveDate> {
    // Datetimes carry the calendar date in their first ten characters.
    let date_part = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn parse_slash(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%d/%m/%Y").ok()
}

fn parse_french_long(s: &str) -> Option<NaiveDate> {
    let lowered = s.to_lowercase();
    let mut tokens = lowered.split_whitespace().peekable();

    if tokens
        .peek()
        .is_some_and(|t| FRENCH_WEEKDAYS.contains(&t.trim_end_matches(',')))
    {
        tokens.next();
    }

    let day_token = tokens.next()?;
    let day: u32 = day_token.trim_end_matches("er").parse().ok()?;
    let month_token = tokens.next()?;
    let month = FRENCH_MONTHS
        .iter()
        .find(|(name, _)| *name == month_token)
        .map(|(_, m)| *m)?;
    let year: i32 = tokens.next()?.parse().ok()?;
    if tokens.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Translate a source nationality into a canonical English country name.
///
/// Dual nationalities (`Française/Sénégalaise`) keep the first one.
pub fn normalize_nationality(raw: &str) -> Result<String, NormalizeError> {
    let cleaned = strip_markup(&raw.replace('_', " "));
    if cleaned.is_empty() {
        return Err(NormalizeError::UnknownNationality(raw.to_string()));
    }

    if let Some((_, country)) = NATIONALITY_OVERRIDES
        .iter()
        .find(|(from, _)| from.eq_ignore_ascii_case(&cleaned))
    {
        return Ok(country.to_string());
    }
    // Flag file names carry the article: `the Netherlands`, `the Gambia`.
    let unprefixed = strip_article(&cleaned);
    if let Some(country) = canonical_country(unprefixed) {
        return Ok(country.to_string());
    }

    let mut translated = Vec::new();
    for token in cleaned.split(|c: char| c == '/' || c.is_whitespace()) {
        if token.is_empty() {
            continue;
        }
        let lowered = token.to_lowercase();
        let country = FRENCH_DEMONYMS
            .iter()
            .find(|(demonym, _)| *demonym == lowered)
            .map(|(_, country)| *country)
            .ok_or_else(|| NormalizeError::UnknownNationality(raw.to_string()))?;
        translated.push(country);
    }

    translated
        .first()
        .map(|c| c.to_string())
        .ok_or_else(|| NormalizeError::UnknownNationality(raw.to_string()))
}

fn strip_article(name: &str) -> &str {
    match name.get(..4) {
        Some(article) if article.eq_ignore_ascii_case("the ") => name[4..].trim_start(),
        _ => name,
    }
}

fn canonical_country(name: &str) -> Option<&'static str> {
    COUNTRIES
        .iter()
        .find(|c| c.to_lowercase() == name.to_lowercase())
        .copied()
}

/// Map a source position into the four canonical positions.
pub fn normalize_position(raw: &str, vocabulary: PositionVocabulary) -> Result<Position, NormalizeError> {
    let token = strip_markup(raw);
    let table: &[(&str, Position)] = match vocabulary {
        PositionVocabulary::Api => API_POSITIONS,
        PositionVocabulary::ScrapedCode => SCRAPED_POSITIONS,
    };
    table
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(&token))
        .map(|(_, position)| *position)
        .ok_or_else(|| NormalizeError::UnknownPosition(raw.to_string()))
}

/// Remove parenthetical / bracketed annotations and whitespace artifacts
/// (`Stade Charléty[1]`, `Paris FC (football)`, non-breaking spaces).
pub fn strip_markup(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut depth: u32 = 0;

    for ch in raw.chars() {
        match ch {
            '(' | '[' => {
                depth += 1;
                continue;
            }
            ')' | ']' => {
                if depth > 0 {
                    depth -= 1;
                }
                continue;
            }
            _ if depth > 0 => continue,
            '\u{a0}' | '\u{202f}' => out.push(' '),
            _ => out.push(ch),
        }
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a display name on its first whitespace boundary.
///
/// Known limitation: multi-word first names end up in the last name
/// (`Jean Philippe Mateta` -> `Jean`, `Philippe Mateta`). A single token is
/// treated as a last name.
pub fn split_full_name(raw: &str) -> (String, String) {
    let cleaned = strip_markup(raw);
    match cleaned.split_once(' ') {
        Some((first, last)) => (first.to_string(), last.trim().to_string()),
        None => (String::new(), cleaned),
    }
}

/// Case-normalized comparison key for names.
pub fn lookup_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
