// Configuration loading and parsing (config/wardle.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

/// Everything the server needs, assembled from `config/wardle.toml`.
///
/// Every section is optional in the file; missing sections and keys fall
/// back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataPaths,
    pub rules: LoadRules,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin allowed to call `/api/*` from a browser.
    pub cors_origin: String,
    /// Seconds a client has to send a complete request before it gets a 408.
    pub read_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            cors_origin: "http://localhost:3000".into(),
            read_timeout_secs: 10,
        }
    }
}

/// Locations of the Lahman-format CSV tables. File names are resolved
/// against `dir`; `fielding` may be omitted entirely.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub dir: String,
    pub batting: String,
    pub people: String,
    pub fielding: Option<String>,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            dir: "data".into(),
            batting: "Batting.csv".into(),
            people: "People.csv".into(),
            fielding: Some("Fielding.csv".into()),
        }
    }
}

impl DataPaths {
    /// Point every table at `dir`, keeping the default file names.
    pub fn in_dir(dir: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    pub fn batting_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.batting)
    }

    pub fn people_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.people)
    }

    pub fn fielding_path(&self) -> Option<PathBuf> {
        self.fielding.as_ref().map(|f| Path::new(&self.dir).join(f))
    }
}

/// Which season populates a player's summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonSelection {
    /// Highest batting average; ties go to more at-bats, then the later year.
    BestAverage,
    /// Latest season; ties (multiple stints) go to more at-bats.
    MostRecent,
}

/// How fielding rows collapse into a player's position list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    /// Every position ever recorded, sorted and deduplicated.
    All,
    /// The position with the most games in the player's latest fielding season.
    MostRecent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoadRules {
    pub min_at_bats: u32,
    /// Earliest season kept; 0 disables the cutoff.
    pub min_year: u16,
    pub selection: SeasonSelection,
    pub positions: PositionMode,
}

impl Default for LoadRules {
    fn default() -> Self {
        Self {
            min_at_bats: 100,
            min_year: 2000,
            selection: SeasonSelection::BestAverage,
            positions: PositionMode::All,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Maximum players returned by a by-team query.
    pub team_cap: usize,
    /// Players below this average are never drawn by random sampling.
    pub sample_min_average: f64,
    pub default_sample: usize,
    pub default_search_limit: usize,
    /// Upper bound applied to caller-supplied `count` and `limit` values.
    pub max_results: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            team_cap: 20,
            sample_min_average: 0.200,
            default_sample: 50,
            default_search_limit: 10,
            max_results: 200,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/wardle.toml` relative to `base_dir`.
///
/// The file is optional: when it does not exist the defaults are validated
/// and returned. A file that exists but fails to parse is an error.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join("wardle.toml");

    let config = if path.exists() {
        let text = read_file(&path)?;
        parse_config(&text).map_err(|e| ConfigError::ParseError {
            path: path.clone(),
            source: e,
        })?
    } else {
        Config::default()
    };

    validate(&config)?;

    Ok(config)
}

/// Convenience wrapper: loads config relative to the current working directory.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    load_config_from(&cwd)
}

/// Parse config text without touching the filesystem or validating.
pub fn parse_config(text: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(text)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.port".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.server.read_timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.read_timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.data.batting.trim().is_empty() || config.data.people.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "data".into(),
            message: "batting and people file names must not be empty".into(),
        });
    }

    let q = &config.query;
    let size_fields: &[(&str, usize)] = &[
        ("query.team_cap", q.team_cap),
        ("query.default_sample", q.default_sample),
        ("query.default_search_limit", q.default_search_limit),
        ("query.max_results", q.max_results),
    ];
    for (name, val) in size_fields {
        if *val == 0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: "must be > 0".into(),
            });
        }
    }

    let min_avg = q.sample_min_average;
    if !(0.0..=1.0).contains(&min_avg) {
        return Err(ConfigError::ValidationError {
            field: "query.sample_min_average".into(),
            message: format!("must be between 0.0 and 1.0 inclusive, got {min_avg}"),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_base(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(format!("wardle_config_{name}"));
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        tmp
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = std::env::temp_dir().join("wardle_config_absent");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let config = load_config_from(&tmp).expect("defaults should validate");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.cors_origin, "http://localhost:3000");
        assert_eq!(config.server.read_timeout_secs, 10);
        assert_eq!(config.rules.min_at_bats, 100);
        assert_eq!(config.rules.min_year, 2000);
        assert_eq!(config.rules.selection, SeasonSelection::BestAverage);
        assert_eq!(config.rules.positions, PositionMode::All);
        assert_eq!(config.query.team_cap, 20);
        assert!((config.query.sample_min_average - 0.2).abs() < f64::EPSILON);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let tmp = temp_base("partial");
        fs::write(
            tmp.join("config/wardle.toml"),
            "[rules]\nmin_at_bats = 10\nselection = \"most_recent\"\n\n[server]\nport = 8080\n",
        )
        .unwrap();

        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.rules.min_at_bats, 10);
        assert_eq!(config.rules.selection, SeasonSelection::MostRecent);
        assert_eq!(config.rules.min_year, 2000);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.data.batting, "Batting.csv");

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let tmp = temp_base("invalid");
        fs::write(tmp.join("config/wardle.toml"), "[rules\nmin_at_bats = ").unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn unknown_selection_is_parse_error() {
        let err = parse_config("[rules]\nselection = \"worst_average\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn data_paths_resolve_against_dir() {
        let config = parse_config(
            "[data]\ndir = \"/srv/lahman\"\nbatting = \"bat.csv\"\n",
        )
        .unwrap();
        assert_eq!(config.data.batting_path(), PathBuf::from("/srv/lahman/bat.csv"));
        assert_eq!(config.data.people_path(), PathBuf::from("/srv/lahman/People.csv"));
        assert_eq!(
            config.data.fielding_path(),
            Some(PathBuf::from("/srv/lahman/Fielding.csv"))
        );
    }

    #[test]
    fn rejects_zero_port() {
        let config = parse_config("[server]\nport = 0\n").unwrap();
        let err = validate(&config).unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "server.port"),
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_read_timeout() {
        let config = parse_config("[server]\nread_timeout_secs = 0\n").unwrap();
        match validate(&config).unwrap_err() {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "server.read_timeout_secs")
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_team_cap() {
        let config = parse_config("[query]\nteam_cap = 0\n").unwrap();
        let err = validate(&config).unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "query.team_cap"),
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn rejects_sample_average_out_of_range() {
        let config = parse_config("[query]\nsample_min_average = 1.5\n").unwrap();
        let err = validate(&config).unwrap_err();
        match err {
            ConfigError::ValidationError { field, message } => {
                assert_eq!(field, "query.sample_min_average");
                assert!(message.contains("1.5"));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn zero_min_year_disables_cutoff() {
        let config = parse_config("[rules]\nmin_year = 0\n").unwrap();
        assert!(validate(&config).is_ok());
        assert_eq!(config.rules.min_year, 0);
    }
}
