//! Permissive parsers for free-form model output.
//!
//! The text-generation providers give no guarantee about the shape of their
//! answers, so every parser here has a fallback instead of an error.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

fn number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("valid number pattern"))
}

fn integer_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid integer pattern"))
}

fn numbered_item_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\**\s*(\d+)\s*[.)]\**\s+(.+?)\s*$").expect("valid list pattern"))
}

/// First integer or decimal number in `text`.
pub fn first_number(text: &str) -> Option<f32> {
    number_pattern()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// 1-based indices found anywhere in `text`, converted to 0-based, limited
/// to `0..len`, de-duplicated and sorted.
pub fn parse_indices(text: &str, len: usize) -> Vec<usize> {
    integer_pattern()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<usize>().ok())
        .filter(|&n| n >= 1 && n <= len)
        .map(|n| n - 1)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberedList {
    pub items: Vec<String>,
    pub takeaways: Option<String>,
}

/// Splits a batch synthesis response into per-article items and the
/// trailing key takeaways.
///
/// Items are lines shaped like `3. text`, ordered by their number. When no
/// such line exists every non-blank line becomes an item and no takeaways
/// are extracted.
pub fn parse_numbered_list(text: &str) -> NumberedList {
    let lines: Vec<&str> = text.lines().collect();
    let heading = lines.iter().position(|l| is_takeaways_heading(l));
    let body = &lines[..heading.unwrap_or(lines.len())];

    let mut numbered: Vec<(usize, String)> = Vec::new();
    for line in body {
        if let Some(caps) = numbered_item_pattern().captures(line) {
            let number = caps[1].parse::<usize>().unwrap_or(usize::MAX);
            numbered.push((number, clean(&caps[2])));
        } else if let Some((_, current)) = numbered.last_mut() {
            let extra = clean(line);
            if !extra.is_empty() {
                current.push(' ');
                current.push_str(&extra);
            }
        }
    }

    if numbered.is_empty() {
        return NumberedList {
            items: text.lines().map(clean).filter(|l| !l.is_empty()).collect(),
            takeaways: None,
        };
    }

    // stable: the first occurrence of a number wins
    numbered.sort_by_key(|(n, _)| *n);
    numbered.dedup_by_key(|(n, _)| *n);

    let takeaways = heading.and_then(|idx| {
        let inline = lines[idx]
            .split_once(':')
            .map(|(_, rest)| clean(rest))
            .unwrap_or_default();
        let rest = lines[idx + 1..]
            .iter()
            .map(|l| clean(l))
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let joined = [inline, rest].into_iter().filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ");
        (!joined.is_empty()).then_some(joined)
    });

    NumberedList {
        items: numbered.into_iter().map(|(_, text)| text).collect(),
        takeaways,
    }
}

/// A line that opens the takeaways section. Numbered lines are items even
/// when they mention key takeaways.
fn is_takeaways_heading(line: &str) -> bool {
    !numbered_item_pattern().is_match(line) && clean(line).to_lowercase().starts_with("key takeaways")
}

fn clean(line: &str) -> String {
    line.trim().trim_matches('*').trim_start_matches('#').trim().to_string()
}
