use anyhow::{Context, Result};
use config::{Config, Environment, File};
use jacdot_core::Language;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub language: Language,
    /// Split repeated subexpressions into temporaries.
    pub cse: bool,
    /// Run numeric spot-checks after deriving.
    pub verify: bool,
    pub format: OutputFormat,
    /// Used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: Language::Plain,
            cse: false,
            verify: false,
            format: OutputFormat::Text,
            log_filter: "warn,jacdot_core=info".to_string(),
        }
    }
}

impl Settings {
    /// Defaults, then `jacdot.toml` if present, then `JACDOT_*` variables.
    pub fn load() -> Result<Self> {
        let builder = Config::builder()
            .add_source(File::with_name("jacdot").required(false))
            .add_source(Environment::with_prefix("JACDOT").try_parsing(true));
        Self::from_config(builder.build().context("reading configuration")?)
    }

    fn from_config(config: Config) -> Result<Self> {
        config
            .try_deserialize()
            .context("invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(text: &str) -> Result<Settings> {
        let config = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?;
        Settings::from_config(config)
    }

    #[test]
    fn empty_configuration_yields_defaults() {
        assert_eq!(from_toml("").unwrap(), Settings::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let settings = from_toml(
            r#"
            language = "rust"
            cse = true
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(settings.language, Language::Rust);
        assert!(settings.cse);
        assert!(!settings.verify);
        assert_eq!(settings.format, OutputFormat::Json);
        assert_eq!(settings.log_filter, Settings::default().log_filter);
    }

    #[test]
    fn unknown_language_is_rejected() {
        let err = from_toml(r#"language = "fortran""#).unwrap_err();
        assert!(format!("{err:#}").contains("invalid configuration"));
    }
}
