//! HiPS `properties` file.
//!
//! ```text
//! # comment
//! obs_title        = DSS colored
//! hips_order       = 9
//! hips_tile_format = jpeg png
//! hips_frame       = equatorial
//! hips_release_date = 2019-01-02T15:27Z
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::date::parse_date;
use crate::index::MAX_ORDER;

/// Errors parsing a properties file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertiesError {
    #[error("Properties are not valid UTF-8")]
    NotUtf8,

    #[error("Line {0} is not a key = value pair")]
    InvalidLine(usize),

    #[error("Missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("Invalid value for '{key}': '{value}'")]
    InvalidValue { key: String, value: String },
}

/// Reference frame of a survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HipsFrame {
    Equatorial,
    Galactic,
    Ecliptic,
    /// Horizontal coordinates of the observer.
    Observed,
    /// Body-fixed frame of a planet.
    Body,
}

impl HipsFrame {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equatorial" | "icrs" | "c" => Some(HipsFrame::Equatorial),
            "galactic" | "g" => Some(HipsFrame::Galactic),
            "ecliptic" | "e" => Some(HipsFrame::Ecliptic),
            "observed" | "horizontal" => Some(HipsFrame::Observed),
            _ => None,
        }
    }
}

impl fmt::Display for HipsFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HipsFrame::Equatorial => "equatorial",
            HipsFrame::Galactic => "galactic",
            HipsFrame::Ecliptic => "ecliptic",
            HipsFrame::Observed => "observed",
            HipsFrame::Body => "body",
        };
        f.write_str(s)
    }
}

/// Tile encoding used for locators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TileFormat {
    Jpeg,
    Png,
    Webp,
    /// Anything else, e.g. `eph` for custom data surveys.
    Custom(String),
}

impl TileFormat {
    /// Pick the preferred format from a `hips_tile_format` list.
    ///
    /// Image formats win over custom ones: jpeg, then png, then webp.
    pub fn choose(list: &str) -> Self {
        let tokens: Vec<String> = list
            .split_whitespace()
            .map(|t| t.to_ascii_lowercase())
            .collect();
        let has = |name: &str| tokens.iter().any(|t| t == name);
        if has("jpeg") || has("jpg") {
            TileFormat::Jpeg
        } else if has("png") {
            TileFormat::Png
        } else if has("webp") {
            TileFormat::Webp
        } else {
            tokens
                .into_iter()
                .next()
                .map(TileFormat::Custom)
                .unwrap_or(TileFormat::Jpeg)
        }
    }

    /// File extension used in tile locators.
    pub fn ext(&self) -> &str {
        match self {
            TileFormat::Jpeg => "jpg",
            TileFormat::Png => "png",
            TileFormat::Webp => "webp",
            TileFormat::Custom(ext) => ext,
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, TileFormat::Custom(_))
    }
}

/// Parsed survey metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Properties {
    /// Every key as read, including the ones interpreted below.
    pub entries: BTreeMap<String, String>,
    /// Release date as MJD, `0.0` when absent or unparsable.
    pub release_date: f64,
    pub frame: Option<HipsFrame>,
    /// Deepest order with tiles.
    pub max_order: u8,
    /// Shallowest order with tiles.
    pub min_order: u8,
    pub tile_format: TileFormat,
    pub tile_width: u32,
    pub title: Option<String>,
    pub dataproduct_type: Option<String>,
}

/// Default tile width when `hips_tile_width` is absent.
pub const DEFAULT_TILE_WIDTH: u32 = 512;

impl Properties {
    /// Parse properties from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, PropertiesError> {
        let text = std::str::from_utf8(data).map_err(|_| PropertiesError::NotUtf8)?;
        Self::parse(text)
    }

    pub fn parse(text: &str) -> Result<Self, PropertiesError> {
        let entries = parse_key_values(text)?;

        let max_order = match entries.get("hips_order") {
            Some(v) => parse_order("hips_order", v)?,
            None => return Err(PropertiesError::MissingKey("hips_order")),
        };
        let min_order = match entries.get("hips_order_min") {
            Some(v) => parse_order("hips_order_min", v)?.min(max_order),
            None => 0,
        };
        let tile_width = match entries.get("hips_tile_width") {
            Some(v) => v.parse().map_err(|_| PropertiesError::InvalidValue {
                key: "hips_tile_width".to_string(),
                value: v.clone(),
            })?,
            None => DEFAULT_TILE_WIDTH,
        };

        Ok(Self {
            release_date: entries
                .get("hips_release_date")
                .map(|v| parse_date(v))
                .unwrap_or(0.0),
            frame: entries.get("hips_frame").and_then(|v| HipsFrame::parse(v)),
            max_order,
            min_order,
            tile_format: entries
                .get("hips_tile_format")
                .map(|v| TileFormat::choose(v))
                .unwrap_or(TileFormat::Jpeg),
            tile_width,
            title: entries.get("obs_title").cloned(),
            dataproduct_type: entries.get("dataproduct_type").cloned(),
            entries,
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// Shared `key = value` reader for properties files and hipslist blocks.
pub(crate) fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

fn parse_key_values(text: &str) -> Result<BTreeMap<String, String>, PropertiesError> {
    let mut entries = BTreeMap::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = split_key_value(line).ok_or(PropertiesError::InvalidLine(n + 1))?;
        entries.insert(key.to_string(), value.to_string());
    }
    Ok(entries)
}

fn parse_order(key: &str, value: &str) -> Result<u8, PropertiesError> {
    value
        .parse::<u8>()
        .ok()
        .filter(|&o| o <= MAX_ORDER)
        .ok_or_else(|| PropertiesError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}
