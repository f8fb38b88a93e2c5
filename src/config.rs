use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DATA_DIR_VAR: &str = "RUSTY_BUOY_DATA_DIR";
pub const LOCALE_VAR: &str = "RUSTY_BUOY_LOCALE";
pub const HISTORY_DAYS_VAR: &str = "RUSTY_BUOY_HISTORY_DAYS";

/// Startup settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    /// Directory opened at startup, if any.
    pub data_dir: Option<PathBuf>,
    /// Locale of parameter names.
    pub locale: String,
    /// Queries start at local midnight this many days ago.
    pub history_days: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            locale: "en".to_string(),
            history_days: 120,
        }
    }
}

impl ViewerConfig {
    /// Read from the process environment; the first CLI argument, when
    /// present, names the data directory.
    pub fn from_env() -> Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok();
        let mut config = Self::from_lookup(lookup)?;
        if let Some(dir) = std::env::args_os().nth(1) {
            config.data_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup(DATA_DIR_VAR).filter(|s| !s.is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(locale) = lookup(LOCALE_VAR).filter(|s| !s.is_empty()) {
            config.locale = locale;
        }
        if let Some(days) = lookup(HISTORY_DAYS_VAR) {
            config.history_days = days
                .trim()
                .parse()
                .with_context(|| format!("{HISTORY_DAYS_VAR}: '{days}' is not a number of days"))?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ViewerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.history_days, 120);
    }

    #[test]
    fn overrides() {
        let config = ViewerConfig::from_lookup(lookup(&[
            (DATA_DIR_VAR, "/data/buoys"),
            (LOCALE_VAR, "it"),
            (HISTORY_DAYS_VAR, " 30 "),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/data/buoys")));
        assert_eq!(config.locale, "it");
        assert_eq!(config.history_days, 30);
    }

    #[test]
    fn invalid_days() {
        let err = ViewerConfig::from_lookup(lookup(&[(HISTORY_DAYS_VAR, "soon")])).unwrap_err();
        assert!(err.to_string().contains(HISTORY_DAYS_VAR));
    }
}
