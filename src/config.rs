use fs_err::read_to_string;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Lines reported when the config file does not name any.
pub const DEFAULT_LINES: &[&str] = &[
    "20", "20א", "22", "60", "60א", "71", "71א", "631", "632", "634", "63", "163", "160", "127",
];

/// Stop codes used for the geographic filter when the config file does not name any.
pub const DEFAULT_STOP_CODES: &[&str] = &["43334", "43496", "40662"];

/// Target lines and stops for a run. Built once in `main` and passed by reference.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub target_lines: Vec<String>,
    pub target_stop_codes: BTreeSet<String>,
}

/// Shape of the TOML config file, e.g.
///
/// ```toml
/// lines = ["20", "22"]
/// stop_codes = ["43334"]
/// ```
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    lines: Vec<String>,
    #[serde(default)]
    stop_codes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_lines: DEFAULT_LINES.iter().map(|line| line.to_string()).collect(),
            target_stop_codes: DEFAULT_STOP_CODES.iter().map(|code| code.to_string()).collect(),
        }
    }
}

impl Config {
    /// Loads the config file, falling back to the built-in lists. Never fails: a
    /// missing or broken file only costs a warning.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            log::warn!(
                "Configuration file not found: {}. Using default lines and stop codes.",
                path.display()
            );
            return Config::default();
        }
        match read_to_string(path) {
            Ok(text) => Config::from_toml(&text),
            Err(e) => {
                log::warn!("Failed to read configuration file: {e}. Using default lines and stop codes.");
                Config::default()
            }
        }
    }

    pub fn from_toml(text: &str) -> Self {
        let file: ConfigFile = match toml::from_str(text) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("Malformed configuration: {e}. Using default lines and stop codes.");
                return Config::default();
            }
        };
        let defaults = Config::default();

        let target_lines = clean(file.lines);
        let target_lines = if target_lines.is_empty() {
            log::warn!("'lines' is empty or missing in configuration. Using default lines.");
            defaults.target_lines
        } else {
            log::info!("Target lines loaded from configuration: {target_lines:?}");
            target_lines
        };

        let target_stop_codes: BTreeSet<String> = clean(file.stop_codes).into_iter().collect();
        let target_stop_codes = if target_stop_codes.is_empty() {
            log::warn!("'stop_codes' is empty or missing in configuration. Using default stop codes.");
            defaults.target_stop_codes
        } else {
            log::info!("Target stop codes loaded from configuration: {target_stop_codes:?}");
            target_stop_codes
        };

        Config {
            target_lines,
            target_stop_codes,
        }
    }

    pub fn is_target_line(&self, line: &str) -> bool {
        self.target_lines.iter().any(|target| target == line)
    }
}

fn clean(values: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !cleaned.iter().any(|seen| seen == value) {
            cleaned.push(value.to_string());
        }
    }
    cleaned
}
