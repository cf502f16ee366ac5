//! Filter settings from the command line and an optional TOML file
//!
//! ```toml
//! min = "warning"
//! exclude = ["critical"]
//! quiet = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use flog_logs::{Level, LevelFilter, LevelSet};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Options as given by one source (file or command line)
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    pub min: Option<Level>,
    pub max: Option<Level>,
    pub exclude: Vec<Level>,
    pub include: Vec<Level>,
    /// `None` when this source does not say
    pub quiet: Option<bool>,
    pub verbose: u8,
}

impl Options {
    /// Load options from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Layer `overrides` on top of these options
    pub fn merge(self, overrides: Options) -> Options {
        Options {
            min: overrides.min.or(self.min),
            max: overrides.max.or(self.max),
            exclude: if overrides.exclude.is_empty() {
                self.exclude
            } else {
                overrides.exclude
            },
            include: if overrides.include.is_empty() {
                self.include
            } else {
                overrides.include
            },
            quiet: overrides.quiet.or(self.quiet),
            verbose: overrides.verbose.max(self.verbose),
        }
    }
}

/// Resolved settings for a run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub filter: LevelFilter,
    /// Whether "omitted lines" notices are shown
    pub summaries: bool,
    pub log_level: tracing::Level,
}

impl From<Options> for Settings {
    fn from(options: Options) -> Self {
        let mut filter = LevelFilter::new()
            .with_exclude(options.exclude.into_iter().collect::<LevelSet>())
            .with_include(options.include.into_iter().collect::<LevelSet>());
        if let Some(min) = options.min {
            filter = filter.with_min(min);
        }
        if let Some(max) = options.max {
            filter = filter.with_max(max);
        }

        let quiet = options.quiet.unwrap_or(false);
        let log_level = match (quiet, options.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        Self {
            filter,
            summaries: !quiet,
            log_level,
        }
    }
}
