//! Deterministic locators for survey resources.

use crate::index::TileAddress;

/// Number of tiles per `Dir` bucket in the HiPS directory layout.
const DIR_BUCKET: u64 = 10_000;

/// Builds locators for a survey rooted at `base`.
///
/// When the survey carries a release date, `?v=<mjd>` is appended so that
/// HTTP caches see a new URL after every release.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyLocator {
    base: String,
    release_date: f64,
}

impl SurveyLocator {
    pub fn new(base: &str, release_date: f64) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            release_date,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn release_date(&self) -> f64 {
        self.release_date
    }

    pub fn set_release_date(&mut self, release_date: f64) {
        self.release_date = release_date;
    }

    /// `{base}/properties`
    pub fn properties(&self) -> String {
        self.finish(format!("{}/properties", self.base))
    }

    /// `{base}/Norder{o}/Allsky.{ext}`
    pub fn allsky(&self, order: u8, ext: &str) -> String {
        self.finish(format!("{}/Norder{}/Allsky.{}", self.base, order, ext))
    }

    /// `{base}/Norder{o}/Dir{d}/Npix{p}.{ext}`
    pub fn tile(&self, addr: TileAddress, ext: &str) -> String {
        let dir = (addr.pix() / DIR_BUCKET) * DIR_BUCKET;
        self.finish(format!(
            "{}/Norder{}/Dir{}/Npix{}.{}",
            self.base,
            addr.order(),
            dir,
            addr.pix(),
            ext
        ))
    }

    fn finish(&self, mut locator: String) -> String {
        if self.release_date != 0.0 {
            locator.push_str(&format!("?v={}", self.release_date.floor() as i64));
        }
        locator
    }
}
