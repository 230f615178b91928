use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings file picked up from the working directory when `--config` is absent.
pub const DEFAULT_SETTINGS_FILE: &str = "synthehr.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("toml decode error in {path}: {source}")]
    TomlDecode {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Optional overrides read from `synthehr.toml`.
///
/// Every field is optional; command-line flags win over file values and
/// file values win over built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub concurrency: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub progress_every: Option<u64>,
    pub text_replace_probability: Option<f64>,
    pub quantity_jitter: Option<f64>,
    pub date_window_days: Option<i64>,
    pub date_window_minutes: Option<i64>,
    pub thesaurus: Option<PathBuf>,
    pub coded_synonyms: Option<PathBuf>,
}

/// Load `explicit` if given, else `synthehr.toml` when it exists, else defaults.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings, SettingsError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_SETTINGS_FILE);
            if !fallback.exists() {
                return Ok(Settings::default());
            }
            fallback
        }
    };

    let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
        path: path.clone(),
        source,
    })?;
    let settings: Settings =
        toml::from_str(&content).map_err(|source| SettingsError::TomlDecode {
            path: path.clone(),
            source,
        })?;
    tracing::debug!(path = %path.display(), "settings loaded");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_leaves_other_fields_unset() {
        let settings: Settings = toml::from_str(
            "concurrency = 8\nquantity_jitter = 0.05\nthesaurus = \"lexicon/extra.json\"\n",
        )
        .expect("parse settings");
        assert_eq!(settings.concurrency, Some(8));
        assert_eq!(settings.quantity_jitter, Some(0.05));
        assert_eq!(settings.thesaurus, Some(PathBuf::from("lexicon/extra.json")));
        assert!(settings.request_timeout_secs.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Settings>("concurency = 8\n").is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("synthehr_missing_{}.toml", uuid::Uuid::new_v4()));
        assert!(matches!(
            load_settings(Some(&path)),
            Err(SettingsError::Io { .. })
        ));
    }
}
