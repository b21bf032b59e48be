//! Hipslist parsing.
//!
//! A hipslist enumerates surveys as blocks of `key = value` lines
//! separated by blank lines. Every block must carry `hips_service_url`.

use std::collections::BTreeMap;
use std::ops::ControlFlow;

use serde::Serialize;
use thiserror::Error;

use super::date::parse_date;
use super::properties::split_key_value;

/// Structural errors in a hipslist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HipsListError {
    #[error("Line {0} is not a key = value pair")]
    InvalidLine(usize),

    #[error("Entry ending at line {0} has no hips_service_url")]
    MissingUrl(usize),
}

/// One survey listed in a hipslist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HipsListEntry {
    /// Value of `hips_service_url`.
    pub url: String,
    /// Value of `hips_release_date` as MJD, `0.0` when absent.
    pub release_date: f64,
    /// Every key of the block.
    pub properties: BTreeMap<String, String>,
}

impl HipsListEntry {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.get("obs_title")
    }
}

/// Parse `text`, calling `callback` for each entry in file order.
///
/// Returns the number of entries handed to the callback. When the callback
/// breaks, parsing stops and the entry that broke is counted. A structural
/// error stops parsing; callbacks already made are not undone.
pub fn parse_hipslist<F>(text: &str, mut callback: F) -> Result<usize, HipsListError>
where
    F: FnMut(&HipsListEntry) -> ControlFlow<()>,
{
    let mut count = 0;
    let mut block: BTreeMap<String, String> = BTreeMap::new();
    let mut line_count = 0;

    for (n, raw) in text.lines().enumerate() {
        line_count = n + 1;
        let line = raw.trim();
        if line.starts_with('#') {
            continue;
        }
        if !line.is_empty() {
            let (key, value) = split_key_value(line).ok_or(HipsListError::InvalidLine(n + 1))?;
            block.insert(key.to_string(), value.to_string());
            continue;
        }
        if !block.is_empty() {
            let entry = finish_entry(std::mem::take(&mut block), n + 1)?;
            count += 1;
            if callback(&entry).is_break() {
                return Ok(count);
            }
        }
    }

    // The last entry may run to the end of input.
    if !block.is_empty() {
        let entry = finish_entry(block, line_count)?;
        count += 1;
        let _ = callback(&entry);
    }
    Ok(count)
}

/// Collect every entry of `text`.
pub fn collect_hipslist(text: &str) -> Result<Vec<HipsListEntry>, HipsListError> {
    let mut entries = Vec::new();
    parse_hipslist(text, |entry| {
        entries.push(entry.clone());
        ControlFlow::Continue(())
    })?;
    Ok(entries)
}

fn finish_entry(
    properties: BTreeMap<String, String>,
    line: usize,
) -> Result<HipsListEntry, HipsListError> {
    let url = properties
        .get("hips_service_url")
        .cloned()
        .ok_or(HipsListError::MissingUrl(line))?;
    let release_date = properties
        .get("hips_release_date")
        .map(|d| parse_date(d))
        .unwrap_or(0.0);
    Ok(HipsListEntry {
        url,
        release_date,
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "\
# Generated list
creator_did = ivo://CDS/P/DSS2/color
obs_title = DSS colored
hips_service_url = https://alasky.cds.unistra.fr/DSS/DSSColor
hips_release_date = 2019-01-02T15:27Z

creator_did = ivo://nova/milkyway
obs_title = Milkyway
hips_service_url = https://data.example.org/surveys/milkyway

hips_service_url = https://data.example.org/surveys/moon
obs_title = Moon
";

    #[test]
    fn test_three_entries_in_order() {
        let mut urls = Vec::new();
        let count = parse_hipslist(LIST, |entry| {
            urls.push(entry.url.clone());
            ControlFlow::Continue(())
        })
        .unwrap();

        assert_eq!(count, 3);
        assert_eq!(
            urls,
            vec![
                "https://alasky.cds.unistra.fr/DSS/DSSColor",
                "https://data.example.org/surveys/milkyway",
                "https://data.example.org/surveys/moon",
            ]
        );
    }

    #[test]
    fn test_entry_fields() {
        let entries = collect_hipslist(LIST).unwrap();
        assert!((entries[0].release_date - 58485.64375).abs() < 1e-9);
        assert_eq!(entries[1].release_date, 0.0);
        assert_eq!(entries[1].title(), Some("Milkyway"));
        assert_eq!(entries[2].get("obs_title"), Some("Moon"));
    }

    #[test]
    fn test_callback_break_stops_parse() {
        let mut calls = 0;
        let count = parse_hipslist(LIST, |_| {
            calls += 1;
            ControlFlow::Break(())
        })
        .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unterminated_entry_is_error() {
        let broken = "\
hips_service_url = https://a.example.org/one

obs_title = no url here
hips_release_date = 2019-01-02T15:27Z

hips_service_url = https://a.example.org/three
";
        let mut seen = Vec::new();
        let result = parse_hipslist(broken, |entry| {
            seen.push(entry.url.clone());
            ControlFlow::Continue(())
        });
        assert_eq!(result, Err(HipsListError::MissingUrl(5)));
        assert_eq!(seen, vec!["https://a.example.org/one"]);
    }

    #[test]
    fn test_garbage_line_is_error() {
        let result = parse_hipslist("hips_service_url = x\nthis is not valid\n", |_| {
            ControlFlow::Continue(())
        });
        assert_eq!(result, Err(HipsListError::InvalidLine(2)));
    }

    #[test]
    fn test_trailing_comment_keeps_last_entry() {
        let text = "hips_service_url = https://a.example.org/one\n# end of list\n";
        let mut seen = Vec::new();
        let count = parse_hipslist(text, |entry| {
            seen.push(entry.url.clone());
            ControlFlow::Continue(())
        });
        assert_eq!(count, Ok(1));
        assert_eq!(seen, vec!["https://a.example.org/one"]);
    }

    #[test]
    fn test_trailing_comment_without_url_is_error() {
        let text = "obs_title = orphan\n# end of list\n";
        assert_eq!(
            parse_hipslist(text, |_| ControlFlow::Continue(())),
            Err(HipsListError::MissingUrl(2))
        );
    }

    #[test]
    fn test_empty_list() {
        assert_eq!(parse_hipslist("\n# nothing\n\n", |_| ControlFlow::Continue(())), Ok(0));
    }
}
