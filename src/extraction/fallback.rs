//! Pattern-based state extraction.
//!
//! Used when the generator is unavailable, times out, or returns output
//! that does not parse. Recognizes medications, foods, blood glucose and
//! A1C readings in Turkish text. Discourse and assistant outputs are left
//! untouched.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use crate::detection::normalize;
use crate::models::{ChatMessage, measurement_kinds};
use crate::state::{EntityUpdate, RawMeasurement, RawMention, StateUpdate};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Plausible blood glucose range in mg/dL.
pub const GLUCOSE_RANGE: std::ops::RangeInclusive<f64> = 40.0..=600.0;

/// Plausible A1C range in percent.
pub const A1C_RANGE: std::ops::RangeInclusive<f64> = 3.0..=20.0;

/// Common Turkish case and plural endings allowed after a known stem.
const SUFFIX: &str = r"(?:l[ae]r)?(?:[ıiuü]|y[ıiuü]|n[ıiuü]|[ıiuü]n[ıiuü]|d[ae]n|t[ae]n|[yl][ae]|l[ae])?";

const KNOWN_MEDICATIONS: &[&str] = &[
    "metformin",
    "insülin",
    "insulin",
    "glifor",
    "glucophage",
    "januvia",
    "jardiance",
    "lantus",
    "novorapid",
    "humalog",
    "levemir",
    "tresiba",
    "ozempic",
    "trulicity",
    "gliklazid",
    "diamicron",
    "amaryl",
    "aspirin",
    "atorvastatin",
    "ramipril",
    "losartan",
];

const COMMON_FOODS: &[&str] = &[
    "ekmek",
    "pilav",
    "makarna",
    "patates",
    "pirinç",
    "bulgur",
    "yulaf",
    "yumurta",
    "peynir",
    "süt",
    "yoğurt",
    "ayran",
    "meyve",
    "elma",
    "muz",
    "portakal",
    "üzüm",
    "karpuz",
    "çilek",
    "hurma",
    "bal",
    "reçel",
    "çikolata",
    "tatlı",
    "baklava",
    "kek",
    "kurabiye",
    "çay",
    "kahve",
    "kola",
    "meyve suyu",
    "salata",
    "sebze",
    "mercimek",
    "nohut",
    "fasulye",
    "tavuk",
    "kırmızı et",
    "balık",
    "köfte",
    "börek",
    "simit",
    "pide",
    "lahmacun",
    "döner",
];

/// Words captured by the verb-context patterns that are not entity names.
static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "ne", "neler", "bunu", "onu", "şunu", "bir", "biraz", "çok", "az", "daha", "hiç", "bugün",
        "dün", "sabah", "öğlen", "akşam", "gece", "şimdi", "sonra", "önce", "hangi", "hangisini",
        "bunları", "onları", "her", "şey", "bişey", "birşey", "zaten", "yine", "tekrar", "hep",
        "sadece", "ben", "sen", "bu", "şu", "o", "de", "da", "ve", "ile", "mi", "mı", "kaç",
        "kadar", "doktorun", "doktorumun", "günde", "haftada",
    ]
    .into_iter()
    .collect()
});

/// Alternation of `words`, longest first.
fn alternation(words: &[&str]) -> String {
    let mut sorted: Vec<&str> = words.to_vec();
    sorted.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));
    sorted
        .iter()
        .map(|w| regex::escape(w).replace(' ', r"\s+"))
        .collect::<Vec<_>>()
        .join("|")
}

/// Matches any of `words` followed by [`SUFFIX`], capturing the stem.
fn stem_pattern(words: &[&str]) -> Regex {
    Regex::new(&format!(r"\b({}){SUFFIX}\b", alternation(words))).expect("static regex: stem list")
}

/// Like [`stem_pattern`] but must cover the whole input.
fn whole_word_stem(words: &[&str]) -> Regex {
    Regex::new(&format!(r"^({}){SUFFIX}$", alternation(words))).expect("static regex: whole stem")
}

static MEDICATION_STEMS: LazyLock<Regex> = LazyLock::new(|| whole_word_stem(KNOWN_MEDICATIONS));

static FOOD_STEMS: LazyLock<Regex> = LazyLock::new(|| whole_word_stem(COMMON_FOODS));

static SUFFIX_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{SUFFIX}$")).expect("static regex: suffix"));

/// Category words ("medicine", "meal") that the context patterns pick up
/// in place of a name, in any inflection.
static GENERIC_HEADS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:ilaç|ilac|hap|tablet|kapsül|şurup|şurub|iğne|yemek|yemeğ|öğün|gıda|yiyecek|içecek|atıştırmalık)\p{L}*$",
    )
    .expect("static regex: generic heads")
});

static MEDICATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        stem_pattern(KNOWN_MEDICATIONS),
        Regex::new(r"\b(\p{L}+(?:formin|gliptin|gliflozin|glutid|glutide|statin|pril|sartan))\p{L}*\b")
            .expect("static regex: medication suffix"),
        Regex::new(
            r"\b(\p{L}{3,})\s+(?:ilac[ıi]\p{L}*|hap[ıi]\p{L}*|tablet\p{L}*|kullanıyorum|kullanıyor|içiyorum|alıyorum)",
        )
        .expect("static regex: medication context"),
    ]
});

static FOOD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        stem_pattern(COMMON_FOODS),
        Regex::new(r"\b(kahvaltı|öğle\s+yemeği|akşam\s+yemeği|ara\s+öğün)")
            .expect("static regex: meals"),
        Regex::new(
            r"\b(\p{L}{2,})\s+(?:yedim|yiyorum|yiyeceğim|yiyebilir\p{L}*|yemeli\p{L}*|içtim|içebilir\p{L}*)",
        )
        .expect("static regex: food context"),
    ]
});

static GLUCOSE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:(?:kan\s+)?şeker\p{L}*|glukoz\p{L}*|glikoz\p{L}*)\s*[:=]?\s*(\d{2,3})\b|\b(\d{2,3})\s*mg\s*/?\s*dl\b",
    )
    .expect("static regex: blood glucose")
});

static A1C_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:hba1c|a1c)[\p{L}'’]*\s*[:=]?\s*(?:değer\p{L}*\s*)?%?\s*(\d{1,2}(?:[.,]\d{1,2})?)")
        .expect("static regex: a1c")
});

/// Extracts entity and measurement observations from `messages`.
///
/// Each message is scanned on its own so mentions are attributed to the
/// speaker who made them. Names are deduplicated case-insensitively; the
/// first speaker to mention a name keeps the attribution.
#[must_use]
pub fn extract_with_patterns(messages: &[ChatMessage]) -> StateUpdate {
    let mut entities = EntityUpdate::default();
    let mut seen_medications = HashSet::new();
    let mut seen_foods = HashSet::new();
    let mut seen_readings: HashSet<(&'static str, u64)> = HashSet::new();

    for message in messages {
        let text = normalize(&message.content);

        for name in capture_all(&MEDICATION_PATTERNS, &MEDICATION_STEMS, &text) {
            if seen_medications.insert(name.clone()) {
                entities
                    .medications
                    .push(RawMention::new(name, message.role));
            }
        }

        for name in capture_all(&FOOD_PATTERNS, &FOOD_STEMS, &text) {
            if !seen_medications.contains(&name) && seen_foods.insert(name.clone()) {
                entities.foods.push(RawMention::new(name, message.role));
            }
        }

        for reading in readings(&text) {
            if seen_readings.insert((reading.0, reading.1.to_bits())) {
                entities.measurements.push(RawMeasurement {
                    kind: reading.0.to_string(),
                    value: reading.1,
                    unit: Some(reading.2.to_string()),
                });
            }
        }
    }

    StateUpdate {
        entities,
        ..StateUpdate::default()
    }
}

/// Returns group 1 of every match of every pattern, cleaned and filtered.
///
/// Inflected captures are reduced to their stem so that "metformini" and
/// "metformin" name the same entity.
fn capture_all(patterns: &[Regex], stems: &Regex, text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for pattern in patterns {
        for caps in pattern.captures_iter(text) {
            let Some(m) = caps.get(1) else {
                continue;
            };
            let name = stem_of(&collapse_whitespace(m.as_str()), stems, &names);
            if name.chars().count() < 2
                || STOP_WORDS.contains(name.as_str())
                || GENERIC_HEADS.is_match(&name)
            {
                continue;
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Known stem of `name`, or an already captured name it inflects.
fn stem_of(name: &str, stems: &Regex, captured: &[String]) -> String {
    if let Some(stem) = stems.captures(name).and_then(|caps| caps.get(1)) {
        return collapse_whitespace(stem.as_str());
    }
    captured
        .iter()
        .find(|known| {
            name.strip_prefix(known.as_str())
                .is_some_and(|rest| !rest.is_empty() && SUFFIX_ONLY.is_match(rest))
        })
        .cloned()
        .unwrap_or_else(|| name.to_string())
}

/// Finds glucose and A1C readings within their plausible ranges.
fn readings(text: &str) -> Vec<(&'static str, f64, &'static str)> {
    let mut found = Vec::new();

    for caps in GLUCOSE_PATTERN.captures_iter(text) {
        let Some(raw) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        if let Ok(value) = raw.as_str().parse::<f64>() {
            if GLUCOSE_RANGE.contains(&value) {
                found.push((measurement_kinds::BLOOD_GLUCOSE, value, "mg/dL"));
            }
        }
    }

    for caps in A1C_PATTERN.captures_iter(text) {
        let Some(raw) = caps.get(1) else {
            continue;
        };
        if let Ok(value) = raw.as_str().replace(',', ".").parse::<f64>() {
            if A1C_RANGE.contains(&value) {
                found.push((measurement_kinds::A1C, value, "%"));
            }
        }
    }

    found
}
