use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use tracing::debug;

use super::text::non_blank_lines;

const ANCHOR_KEYWORD: &str = "recepci";

/// Other timestamps printed near the receipt one: collection, system entry, print time.
const EXCLUDED_KEYWORDS: [&str; 3] = ["muestra", "ingreso", "impres"];

const LOOKAHEAD_LINES: usize = 3;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SearchTier {
    SameLine,
    Lookahead,
    Relaxed,
}

const SEARCH_CHAIN: [SearchTier; 3] = [
    SearchTier::SameLine,
    SearchTier::Lookahead,
    SearchTier::Relaxed,
];

/// Recovers the specimen receipt date and time from the text of one report page.
#[derive(Debug)]
pub struct ReceiptLocator {
    date: Regex,
    time: Regex,
    date_then_time: Regex,
    labelled: Regex,
}

impl ReceiptLocator {
    pub fn new() -> Result<Self> {
        let date = r"\b(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})\b";
        let time = r"\b(\d{1,2}:\d{2})\b";

        Ok(Self {
            date: Regex::new(date).context("failed to compile receipt date regex")?,
            time: Regex::new(time).context("failed to compile receipt time regex")?,
            date_then_time: Regex::new(&format!(r"{date}\s+{time}"))
                .context("failed to compile receipt date-time regex")?,
            labelled: Regex::new(&format!(r"(?i)fecha.*?{date}.*?hora.*?{time}"))
                .context("failed to compile labelled receipt regex")?,
        })
    }

    pub fn locate(&self, page_text: &str) -> Option<NaiveDateTime> {
        let lines = non_blank_lines(page_text);
        if lines.is_empty() {
            return None;
        }

        SEARCH_CHAIN.iter().find_map(|tier| {
            let found = match tier {
                SearchTier::SameLine => self.search_same_line(&lines),
                SearchTier::Lookahead => self.search_lookahead(&lines),
                SearchTier::Relaxed => self.search_relaxed(&lines),
            };
            if let Some(timestamp) = found {
                debug!(tier = ?tier, received_at = %timestamp, "recovered receipt timestamp");
            }
            found
        })
    }

    fn search_same_line(&self, lines: &[&str]) -> Option<NaiveDateTime> {
        lines
            .iter()
            .filter(|line| is_strict_anchor(line))
            .find_map(|line| {
                anchor_views(line).into_iter().find_map(|view| {
                    self.capture_pair(&self.date_then_time, view)
                        .or_else(|| self.capture_pair(&self.labelled, view))
                })
            })
    }

    fn search_lookahead(&self, lines: &[&str]) -> Option<NaiveDateTime> {
        lines.iter().enumerate().find_map(|(index, line)| {
            if !is_strict_anchor(line) {
                return None;
            }

            let views = anchor_views(line);
            let date = views.iter().find_map(|view| first_capture(&self.date, view))?;
            let following = lines
                .iter()
                .skip(index + 1)
                .take(LOOKAHEAD_LINES)
                .copied();
            let time = views
                .iter()
                .copied()
                .chain(following)
                .find_map(|candidate| first_capture(&self.time, candidate))?;

            build_timestamp(date, time)
        })
    }

    fn search_relaxed(&self, lines: &[&str]) -> Option<NaiveDateTime> {
        lines.iter().enumerate().find_map(|(index, line)| {
            if !contains_keyword(line, ANCHOR_KEYWORD) {
                return None;
            }

            let views = anchor_views(line);
            if let Some(timestamp) = views
                .iter()
                .find_map(|view| self.capture_pair(&self.date_then_time, view))
            {
                return Some(timestamp);
            }

            // Neighbours are scanned anchor line, next line, previous line: text after the
            // keyword is more likely to belong to it than text before.
            let next = lines.get(index + 1).copied();
            let previous = index.checked_sub(1).and_then(|prev| lines.get(prev)).copied();
            let around = views
                .iter()
                .copied()
                .chain(next)
                .chain(previous)
                .collect::<Vec<&str>>();

            let date = around
                .iter()
                .find_map(|candidate| first_capture(&self.date, candidate))?;
            let time = around
                .iter()
                .find_map(|candidate| first_capture(&self.time, candidate))?;
            build_timestamp(date, time)
        })
    }

    fn capture_pair(&self, pattern: &Regex, text: &str) -> Option<NaiveDateTime> {
        pattern.captures_iter(text).find_map(|captures| {
            let date = captures.get(1)?.as_str();
            let time = captures.get(2)?.as_str();
            build_timestamp(date, time)
        })
    }
}

fn first_capture<'a>(pattern: &Regex, text: &'a str) -> Option<&'a str> {
    pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|found| found.as_str())
}

fn contains_keyword(line: &str, keyword: &str) -> bool {
    line.to_ascii_lowercase().contains(keyword)
}

fn is_strict_anchor(line: &str) -> bool {
    let lowered = line.to_ascii_lowercase();
    lowered.contains(ANCHOR_KEYWORD)
        && !EXCLUDED_KEYWORDS
            .iter()
            .any(|keyword| lowered.contains(keyword))
}

/// The line from the anchor keyword onward, then the whole line.
fn anchor_views(line: &str) -> Vec<&str> {
    // ASCII lower-casing keeps byte offsets aligned with `line`.
    match line.to_ascii_lowercase().find(ANCHOR_KEYWORD) {
        Some(offset) if offset > 0 => vec![&line[offset..], line],
        _ => vec![line],
    }
}

/// Builds a timestamp from `D/M/Y` (or `D-M-Y`) and `H:MM`; two-digit years are 20YY.
pub fn build_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let mut date_parts = date.split(['/', '-']);
    let day = date_parts.next()?.parse::<u32>().ok()?;
    let month = date_parts.next()?.parse::<u32>().ok()?;
    let year_raw = date_parts.next()?;
    if date_parts.next().is_some() {
        return None;
    }
    let year = if year_raw.len() == 2 {
        format!("20{year_raw}").parse::<i32>().ok()?
    } else {
        year_raw.parse::<i32>().ok()?
    };

    let (hour, minute) = time.split_once(':')?;
    let hour = hour.parse::<u32>().ok()?;
    let minute = minute.parse::<u32>().ok()?;

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0)
}
