use flog_types::{Level, LevelSet};

/// Severity filter applied to every parsed line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelFilter {
    /// Omit recognized levels below this one
    pub min: Option<Level>,

    /// Omit recognized levels above this one
    pub max: Option<Level>,

    /// Levels to omit
    pub exclude: LevelSet,

    /// Levels to keep (empty = all)
    pub include: LevelSet,
}

impl LevelFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lower bound. `Undefined` means unbounded.
    pub fn with_min(mut self, level: Level) -> Self {
        self.min = Some(level).filter(|l| *l != Level::Undefined);
        self
    }

    /// Set the upper bound. `Undefined` means unbounded.
    pub fn with_max(mut self, level: Level) -> Self {
        self.max = Some(level).filter(|l| *l != Level::Undefined);
        self
    }

    pub fn with_exclude(mut self, levels: LevelSet) -> Self {
        self.exclude = levels;
        self
    }

    pub fn with_include(mut self, levels: LevelSet) -> Self {
        self.include = levels;
        self
    }

    /// Check if filter is empty (passes everything)
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.exclude.is_empty() && self.include.is_empty()
    }

    /// Decide whether a line of the given level is printed
    pub fn should_pass(&self, level: Level) -> bool {
        // An include list is the only gate for what it covers
        if !self.include.is_empty() && !self.include.contains(level) {
            return false;
        }

        if level.is_recognized() {
            if self.min.is_some_and(|min| level < min) {
                return false;
            }
            if self.max.is_some_and(|max| level > max) {
                return false;
            }
        } else if self.exclude.contains(Level::Unknown) {
            return false;
        }

        !self.exclude.contains(level)
    }
}
