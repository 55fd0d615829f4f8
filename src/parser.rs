//! Summary parser: raw model text to a [`Summary`].
//!
//! Section markers are matched loosely. `**TL;DR:**`, `## TL;DR`, `tldr -`
//! and `TL;DR** :` all open the same section. Malformed output never fails;
//! it is reconstructed and flagged low-confidence instead. Only an empty reply
//! is an error.

use crate::config::SummaryConfig;
use crate::source::ContentCategory;
use crate::summary::{Summary, KEY_POINT_PLACEHOLDER};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("model returned an empty response")]
    EmptyModelOutput,
}

lazy_static! {
    static ref LIST_ITEM: Regex =
        Regex::new(r"^\s*(?:[-•*+▪◦‣]|\d{1,2}[.)])\s+(.*)$").unwrap();
    static ref TIMESTAMP: Regex =
        Regex::new(r"[\[(]\d{1,2}:\d{2}(?::\d{2})?[\])]").unwrap();
}

/// TL;DRs longer than this many sentences are cut.
const TLDR_MAX_SENTENCES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    TlDr,
    KeyPoints,
    FullSummary,
}

#[derive(Debug, Default)]
struct Sections {
    preamble: Vec<String>,
    tl_dr: Vec<String>,
    key_points: Vec<String>,
    full_summary: Vec<String>,
    headings_found: bool,
}

impl Sections {
    fn lines_mut(&mut self, section: Option<Section>) -> &mut Vec<String> {
        match section {
            None => &mut self.preamble,
            Some(Section::TlDr) => &mut self.tl_dr,
            Some(Section::KeyPoints) => &mut self.key_points,
            Some(Section::FullSummary) => &mut self.full_summary,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryParser {
    min_key_points: usize,
    max_key_points: usize,
    pad_missing: bool,
}

impl SummaryParser {
    pub fn new(config: &SummaryConfig) -> Self {
        Self {
            min_key_points: config.min_key_points,
            max_key_points: config.max_key_points,
            pad_missing: config.pad_missing_key_points,
        }
    }

    pub fn parse(&self, raw: &str, category: ContentCategory) -> Result<Summary, ParseError> {
        let cleaned = strip_code_fence(raw);
        if cleaned.trim().is_empty() {
            return Err(ParseError::EmptyModelOutput);
        }

        let sections = split_sections(&cleaned);
        let clean = |text: String| {
            if category.is_media() {
                strip_timestamps(&text)
            } else {
                text
            }
        };

        let tl_dr = clean(join_prose(&sections.tl_dr));
        let key_points: Vec<String> = collect_key_points(&sections.key_points)
            .into_iter()
            .map(|point| clean(point))
            .filter(|point| !point.is_empty())
            .collect();
        let full_summary = clean(join_prose(&sections.full_summary));

        if tl_dr.is_empty() && key_points.is_empty() && full_summary.is_empty() {
            return Ok(self.unstructured(&sections, &cleaned, category));
        }

        let mut low_confidence = false;

        let tl_dr = if !tl_dr.is_empty() {
            first_sentences(&tl_dr, TLDR_MAX_SENTENCES)
        } else {
            low_confidence = true;
            match key_points.first() {
                Some(point) => terminate(point),
                None => first_sentences(&full_summary, 1),
            }
        };

        let full_summary = if !full_summary.is_empty() {
            repair_incomplete(&full_summary)
        } else {
            low_confidence = true;
            if key_points.is_empty() {
                tl_dr.clone()
            } else {
                key_points
                    .iter()
                    .map(|p| terminate(p))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        };

        let mut key_points = key_points;
        key_points.truncate(self.max_key_points);
        if key_points.len() < self.min_key_points {
            low_confidence = true;
            if self.pad_missing {
                key_points.resize(self.min_key_points, KEY_POINT_PLACEHOLDER.to_string());
            }
        }

        Ok(Summary::new(tl_dr, key_points, full_summary, low_confidence, category))
    }

    /// A reply with no usable sections becomes the full summary as a whole.
    fn unstructured(&self, sections: &Sections, cleaned: &str, category: ContentCategory) -> Summary {
        let block = if sections.headings_found && !sections.preamble.is_empty() {
            join_prose(&sections.preamble)
        } else {
            join_prose(&cleaned.lines().map(str::to_string).collect::<Vec<_>>())
        };
        let block = if category.is_media() {
            strip_timestamps(&block)
        } else {
            block
        };

        let mut key_points = Vec::new();
        if self.pad_missing {
            key_points.resize(self.min_key_points, KEY_POINT_PLACEHOLDER.to_string());
        }

        Summary::new(first_sentences(&block, 1), key_points, block, true, category)
    }
}

/// Remove a surrounding markdown code fence, if there is one.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();

    // Remove ```lang ... ``` or ``` ... ```
    if let Some(rest) = trimmed.strip_prefix("```") {
        let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        let body = match body.rfind("```") {
            Some(end) => &body[..end],
            None => body,
        };
        return body.trim().to_string();
    }

    trimmed.to_string()
}

fn split_sections(text: &str) -> Sections {
    let mut sections = Sections::default();
    let mut current = None;

    for line in text.lines() {
        if !LIST_ITEM.is_match(line) {
            if let Some((section, remainder)) = heading(line, current.is_some()) {
                sections.headings_found = true;
                current = Some(section);
                if !remainder.is_empty() {
                    sections.lines_mut(current).push(remainder);
                }
                continue;
            }
        }
        sections.lines_mut(current).push(line.to_string());
    }

    sections
}

/// Separators allowed between a heading and text on the same line.
const SEPARATORS: [&str; 4] = [":", " - ", "\u{2014}", "\u{2013}"];

/// Recognize a section heading, returning the section and any text after it.
///
/// The exact section names are always headings. Synonyms such as "Overview"
/// or "Highlights" only count before the first section or on a marked-up line
/// (`#`, `**`, `__`), so ordinary prose inside a section stays there.
fn heading(line: &str, in_section: bool) -> Option<(Section, String)> {
    let trimmed = line.trim();
    let decorated = trimmed.starts_with(['#', '*', '_']);
    let stripped = trimmed
        .trim_start_matches(|c: char| matches!(c, '#' | '*' | '_' | '>') || c.is_whitespace());

    let candidates = [
        split_emphasis(stripped),
        split_separator(stripped),
        Some((stripped, "")),
    ];
    for (label, remainder) in candidates.into_iter().flatten() {
        if label.chars().count() > 40 {
            continue;
        }
        let normalized: String = label
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        let section = exact_section(&normalized).or_else(|| {
            if decorated || !in_section {
                synonym_section(&normalized)
            } else {
                None
            }
        });
        if let Some(section) = section {
            let remainder = remainder
                .trim_start_matches(|c: char| {
                    matches!(c, '*' | '_' | ':' | '-' | '\u{2013}' | '\u{2014}') || c.is_whitespace()
                })
                .trim_end()
                .to_string();
            return Some((section, remainder));
        }
    }
    None
}

fn exact_section(normalized: &str) -> Option<Section> {
    match normalized {
        "tldr" => Some(Section::TlDr),
        "keypoints" => Some(Section::KeyPoints),
        "fullsummary" => Some(Section::FullSummary),
        _ => None,
    }
}

fn synonym_section(normalized: &str) -> Option<Section> {
    match normalized {
        "tldrsummary" => Some(Section::TlDr),
        "keypoint" | "keytakeaways" | "takeaways" | "mainpoints" | "highlights" | "bulletpoints" => {
            Some(Section::KeyPoints)
        }
        "summary" | "detailedsummary" | "overview" | "paragraph" => Some(Section::FullSummary),
        _ => None,
    }
}

/// `TL;DR** rest`: a label closed by bold or underline markup.
fn split_emphasis(text: &str) -> Option<(&str, &str)> {
    text.split_once("**").or_else(|| text.split_once("__"))
}

/// `label: rest`, split at the earliest separator.
fn split_separator(text: &str) -> Option<(&str, &str)> {
    SEPARATORS
        .iter()
        .filter_map(|sep| text.find(sep).map(|idx| (idx, sep.len())))
        .min_by_key(|&(idx, _)| idx)
        .map(|(idx, len)| (&text[..idx], &text[idx + len..]))
}

/// Join a section's lines into one paragraph.
fn join_prose(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| match LIST_ITEM.captures(line) {
            Some(caps) => caps[1].to_string(),
            None => line.clone(),
        })
        .flat_map(|line| {
            line.split_whitespace()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bullet items in order. A wrapped line continues the item above it.
/// Without any bullets, each non-blank line is one point.
fn collect_key_points(lines: &[String]) -> Vec<String> {
    let mut points: Vec<String> = Vec::new();
    let mut saw_bullet = false;
    let mut previous_blank = true;

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            previous_blank = true;
            continue;
        }

        if let Some(caps) = LIST_ITEM.captures(line) {
            saw_bullet = true;
            points.push(caps[1].trim().to_string());
        } else if saw_bullet && !previous_blank {
            if let Some(last) = points.last_mut() {
                last.push(' ');
                last.push_str(trimmed);
            }
        } else if !saw_bullet {
            points.push(trimmed.to_string());
        }
        previous_blank = false;
    }

    points
        .into_iter()
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty())
        .collect()
}

fn strip_timestamps(text: &str) -> String {
    TIMESTAMP
        .replace_all(text, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Byte offsets just past each sentence end.
fn sentence_ends(text: &str) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            match chars.peek() {
                None => ends.push(idx + c.len_utf8()),
                Some((_, next)) if next.is_whitespace() => ends.push(idx + c.len_utf8()),
                _ => {}
            }
        }
    }
    ends
}

/// The first `n` sentences of `text`, terminated.
fn first_sentences(text: &str, n: usize) -> String {
    let text = text.trim();
    match sentence_ends(text).get(n.saturating_sub(1)) {
        Some(&end) => text[..end].trim().to_string(),
        None => terminate(text),
    }
}

fn ends_sentence(text: &str) -> bool {
    text.trim_end_matches(|c: char| matches!(c, '"' | '\'' | ')' | ']' | '”' | '’'))
        .ends_with(['.', '!', '?'])
}

/// Ensure `text` ends with sentence punctuation.
fn terminate(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() || ends_sentence(text) {
        text.to_string()
    } else {
        format!("{}.", text.trim_end_matches([',', ';', ':']))
    }
}

/// Drop a trailing fragment left by a cut-off generation.
fn repair_incomplete(paragraph: &str) -> String {
    let paragraph = paragraph.trim();
    if ends_sentence(paragraph) {
        return paragraph.to_string();
    }
    match sentence_ends(paragraph).last() {
        Some(&end) => paragraph[..end].to_string(),
        None => terminate(paragraph),
    }
}
