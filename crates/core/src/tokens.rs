//! Token substitution engine
//!
//! Service templates carry `{placeholder}` tokens. Expansion is a single
//! left-to-right pass: each token is resolved against the fetched field map
//! first, then the built-in vocabulary. A token with no value is an error,
//! never silent pass-through; an unexpanded placeholder must not reach a
//! caller's ear.

use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::almanac;
use crate::call::CallContext;

/// Field map produced by capability fetchers.
pub type FieldMap = HashMap<String, String>;

/// Built-in placeholder vocabulary, always available from the call context.
pub const VOCABULARY: &[&str] = &[
    "time",
    "day_of_week",
    "season",
    "zodiac_sign",
    "moon_phase",
    "moon_illumination",
    "day_planet",
    "eclipse_season",
    "render_id",
    "city",
    "extension",
    "call_id",
];

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z][a-z0-9_]*)\}").unwrap());

/// Token expansion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The template references a key that neither the built-in vocabulary
    /// nor the fetched data can supply.
    #[error("no value for placeholder {{{0}}}")]
    MissingValue(String),
}

/// Placeholder keys referenced by a template, in lexical order.
///
/// Used at catalog load time to validate templates against the vocabulary
/// and the declared capabilities.
pub fn scan(template: &str) -> BTreeSet<String> {
    PLACEHOLDER_RE
        .captures_iter(template)
        .map(|c| c[1].to_string())
        .collect()
}

/// Whether a key belongs to the built-in vocabulary.
pub fn is_builtin(key: &str) -> bool {
    VOCABULARY.contains(&key)
}

/// Expand every placeholder in `template`.
///
/// Fetched fields shadow built-ins of the same name, so a capability can
/// refine a value like `city`. Substituted text is not re-scanned.
pub fn expand(
    template: &str,
    ctx: &CallContext,
    fetched: &FieldMap,
) -> Result<String, TokenError> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let key = &caps[1];

        out.push_str(&template[last..whole.0]);

        let value = fetched
            .get(key)
            .cloned()
            .or_else(|| builtin_value(key, ctx))
            .ok_or_else(|| TokenError::MissingValue(key.to_string()))?;
        out.push_str(&value);

        last = whole.1;
    }

    out.push_str(&template[last..]);
    Ok(out)
}

fn builtin_value(key: &str, ctx: &CallContext) -> Option<String> {
    let date = ctx.now.date();
    let value = match key {
        "time" => ctx.now.format("%-I:%M %p").to_string(),
        "day_of_week" => ctx.now.format("%A").to_string(),
        "season" => almanac::season(date).to_string(),
        "zodiac_sign" => almanac::zodiac_sign(date).to_string(),
        "moon_phase" => almanac::moon_phase(ctx.now).to_string(),
        "moon_illumination" => almanac::moon_illumination_percent(ctx.now).to_string(),
        "day_planet" => almanac::day_planet(date).to_string(),
        "eclipse_season" => if almanac::in_eclipse_season(ctx.now) {
            "yes".to_string()
        } else {
            "no".to_string()
        },
        "render_id" => uuid::Uuid::new_v4().simple().to_string()[..8].to_string(),
        "city" => ctx.city.clone(),
        "extension" => ctx.extension.clone(),
        "call_id" => ctx.call_id.clone(),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx() -> CallContext {
        CallContext::new(
            "call-1",
            "46767",
            "New York City",
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(15, 42, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_builtin_expansion() {
        let out = expand(
            "It is {time} on a {season} {day_of_week} in {city}.",
            &ctx(),
            &FieldMap::new(),
        )
        .unwrap();
        assert_eq!(out, "It is 3:42 PM on a winter Monday in New York City.");
    }

    #[test]
    fn test_fetched_fields() {
        let mut fetched = FieldMap::new();
        fetched.insert("temp_f".to_string(), "28".to_string());
        let out = expand("Currently {temp_f} degrees.", &ctx(), &fetched).unwrap();
        assert_eq!(out, "Currently 28 degrees.");
    }

    #[test]
    fn test_fetched_shadows_builtin() {
        let mut fetched = FieldMap::new();
        fetched.insert("city".to_string(), "Brooklyn, New York".to_string());
        let out = expand("Weather for {city}.", &ctx(), &fetched).unwrap();
        assert_eq!(out, "Weather for Brooklyn, New York.");
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let err = expand("Report: {quake_report}", &ctx(), &FieldMap::new()).unwrap_err();
        assert_eq!(err, TokenError::MissingValue("quake_report".to_string()));
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        let mut fetched = FieldMap::new();
        fetched.insert("a".to_string(), "{b}".to_string());
        let out = expand("{a}", &ctx(), &fetched).unwrap();
        assert_eq!(out, "{b}");
    }

    #[test]
    fn test_scan() {
        let keys = scan("{zodiac_sign} under a {moon_phase}, {zodiac_sign} again");
        assert_eq!(
            keys.into_iter().collect::<Vec<_>>(),
            vec!["moon_phase".to_string(), "zodiac_sign".to_string()]
        );
    }

    #[test]
    fn test_zodiac_and_moon_placeholders() {
        let out = expand("{zodiac_sign}/{moon_phase}/{moon_illumination}", &ctx(), &FieldMap::new())
            .unwrap();
        assert!(out.starts_with("Capricorn/"));
    }

    #[test]
    fn test_render_id_is_fresh() {
        let a = expand("{render_id}", &ctx(), &FieldMap::new()).unwrap();
        let b = expand("{render_id}", &ctx(), &FieldMap::new()).unwrap();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_vocabulary_membership() {
        assert!(is_builtin("moon_phase"));
        assert!(!is_builtin("quake_report"));
    }
}
