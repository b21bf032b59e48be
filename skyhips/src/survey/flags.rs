//! Survey behaviour flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Set of flags controlling how a survey loads and resolves tiles.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SurveyFlags(u8);

impl SurveyFlags {
    pub const NONE: SurveyFlags = SurveyFlags(0);
    /// Planetary texture rather than a deep-sky survey.
    pub const PLANET: SurveyFlags = SurveyFlags(1 << 0);
    /// Resolve every tile from the all-sky mosaic.
    pub const FORCE_USE_ALLSKY: SurveyFlags = SurveyFlags(1 << 1);
    /// Materialize tiles on the background pool.
    pub const LOAD_IN_BACKGROUND: SurveyFlags = SurveyFlags(1 << 2);
    /// Never start a fetch; serve what is cached.
    pub const CACHED_ONLY: SurveyFlags = SurveyFlags(1 << 3);

    pub fn contains(&self, other: SurveyFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl BitOr for SurveyFlags {
    type Output = SurveyFlags;

    fn bitor(self, rhs: SurveyFlags) -> SurveyFlags {
        SurveyFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for SurveyFlags {
    fn bitor_assign(&mut self, rhs: SurveyFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for SurveyFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::PLANET, "PLANET"),
            (Self::FORCE_USE_ALLSKY, "FORCE_USE_ALLSKY"),
            (Self::LOAD_IN_BACKGROUND, "LOAD_IN_BACKGROUND"),
            (Self::CACHED_ONLY, "CACHED_ONLY"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "SurveyFlags({})", set.join(" | "))
    }
}
