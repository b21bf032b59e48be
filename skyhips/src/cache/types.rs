//! Cache key and statistics types.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::index::TileAddress;

/// Sequence counter for survey identifiers.
static SURVEY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a survey.
///
/// Keys the survey's entries in the shared tile cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurveyId(u64);

impl SurveyId {
    /// Allocate a fresh identifier.
    pub fn next() -> Self {
        Self(SURVEY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurveyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "survey#{}", self.0)
    }
}

/// Key of one cached tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub survey: SurveyId,
    pub addr: TileAddress,
}

impl CacheKey {
    pub fn new(survey: SurveyId, addr: TileAddress) -> Self {
        Self { survey, addr }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.survey, self.addr)
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entry_count: usize,
    pub resident_bytes: usize,
    pub budget_bytes: usize,
}

impl CacheStats {
    /// Fraction of lookups that hit, or 0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} entries, {}/{} bytes, {} hits, {} misses, {} evictions",
            self.entry_count,
            self.resident_bytes,
            self.budget_bytes,
            self.hits,
            self.misses,
            self.evictions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survey_ids_are_unique() {
        let a = SurveyId::next();
        let b = SurveyId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_stats_display() {
        let stats = CacheStats {
            entry_count: 2,
            resident_bytes: 100,
            budget_bytes: 200,
            ..Default::default()
        };
        assert!(stats.to_string().contains("100/200 bytes"));
    }
}
