// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Field extraction cascades. Each cascade is an ordered list of independent
// matchers; the first one that produces a value wins.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// A single extraction rule.
pub type Matcher = fn(&str) -> Option<String>;

/// Run `matchers` in order over `text`, returning the first hit.
pub fn run_cascade(text: &str, matchers: &[(&str, Matcher)]) -> Option<String> {
    matchers.iter().find_map(|(name, matcher)| {
        let hit = matcher(text)?;
        debug!(rule = name, value = %hit, "Field matched");
        Some(hit)
    })
}

// ---------------------------------------------------------------------------
// Tracking numbers
// ---------------------------------------------------------------------------

static CJK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[一-龥]").expect("static regex must compile"));
static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Z0-9\s]").expect("static regex must compile"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex must compile"));
static TRACKING_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z0-9]{10,20}\b").expect("static regex must compile"));

/// Uppercase, blank out CJK ideographs and anything not `[A-Z0-9\s]`, then
/// collapse whitespace.
pub fn normalize_tracking_text(text: &str) -> String {
    let upper = text.to_uppercase();
    let no_cjk = CJK.replace_all(&upper, " ");
    let alnum = NON_ALNUM.replace_all(&no_cjk, " ");
    WHITESPACE.replace_all(&alnum, " ").trim().to_string()
}

fn is_alnum_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn tracking_length_ok(token: &str) -> bool {
    (10..=20).contains(&token.len())
}

fn tracking_whole_word(text: &str) -> Option<String> {
    TRACKING_WORD.find(text).map(|m| m.as_str().to_string())
}

fn tracking_single_token(text: &str) -> Option<String> {
    text.split_whitespace()
        .find(|t| tracking_length_ok(t) && is_alnum_token(t))
        .map(str::to_string)
}

fn tracking_adjacent_pair(text: &str) -> Option<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.windows(2).find_map(|pair| {
        let joined = format!("{}{}", pair[0], pair[1]);
        (tracking_length_ok(&joined) && is_alnum_token(&joined)).then_some(joined)
    })
}

fn tracking_longest_token(text: &str) -> Option<String> {
    // max_by_key keeps the last of equal maxima; reverse so the first wins.
    text.split_whitespace()
        .filter(|t| t.len() >= 8 && is_alnum_token(t))
        .rev()
        .max_by_key(|t| t.len())
        .map(str::to_string)
}

const TRACKING_CASCADE: &[(&str, Matcher)] = &[
    ("whole-word", tracking_whole_word),
    ("single-token", tracking_single_token),
    ("adjacent-pair", tracking_adjacent_pair),
    ("longest-token", tracking_longest_token),
];

/// Extract a tracking number from raw OCR text.
pub fn extract_tracking_number(text: &str) -> Option<String> {
    let normalized = normalize_tracking_text(text);
    debug!(normalized = %normalized, "Tracking text normalised");
    run_cascade(&normalized, TRACKING_CASCADE)
}

// ---------------------------------------------------------------------------
// Package counts
// ---------------------------------------------------------------------------

static COUNT_PIECES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)\s*件").expect("static regex must compile"));
static COUNT_TOTAL_PACKAGES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"共\s*([0-9]+)\s*包").expect("static regex must compile"));
static COUNT_FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)\s*/\s*([0-9]+)").expect("static regex must compile"));
static COUNT_ANY_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("static regex must compile"));

fn pieces(n: &str) -> String {
    format!("{n}件")
}

fn count_pieces(text: &str) -> Option<String> {
    COUNT_PIECES.captures(text).map(|c| pieces(&c[1]))
}

fn count_total_packages(text: &str) -> Option<String> {
    COUNT_TOTAL_PACKAGES.captures(text).map(|c| pieces(&c[1]))
}

fn count_fraction(text: &str) -> Option<String> {
    COUNT_FRACTION.captures(text).map(|c| pieces(&c[2]))
}

fn count_any_number(text: &str) -> Option<String> {
    COUNT_ANY_NUMBER.find(text).map(|m| pieces(m.as_str()))
}

const PACKAGE_CASCADE: &[(&str, Matcher)] = &[
    ("pieces", count_pieces),
    ("total-packages", count_total_packages),
    ("fraction", count_fraction),
    ("any-number", count_any_number),
];

/// Extract a package count, normalised to `"<n>件"`, from raw OCR text.
pub fn extract_package_count(text: &str) -> Option<String> {
    run_cascade(text, PACKAGE_CASCADE)
}
