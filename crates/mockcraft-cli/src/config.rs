use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use mockcraft_seed::SeedOptions;

use crate::registry::LogFormat;

/// Settings file (`mockcraft.toml`); command-line flags override it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub dsn: Option<String>,
    pub run_dir: Option<PathBuf>,
    pub log_format: Option<LogFormat>,
    pub seed: SeedOptions,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| format!("{}: {err}", path.display()))?;
        toml::from_str(&content).map_err(|err| format!("{}: {err}", path.display()))
    }

    /// Load `path` when given, otherwise `./mockcraft.toml` if present.
    pub fn discover(path: Option<&Path>) -> Result<Self, String> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let local = Path::new("mockcraft.toml");
                if local.exists() {
                    Self::load(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_seed_options() {
        let config: CliConfig = toml::from_str(
            r#"
dsn = "sqlite://seed.db"
log_format = "json"

[seed]
seed = 7
verify = false
"#,
        )
        .expect("config");
        assert_eq!(config.dsn.as_deref(), Some("sqlite://seed.db"));
        assert_eq!(config.log_format, Some(LogFormat::Json));
        assert_eq!(config.seed.seed, 7);
        assert!(!config.seed.verify);
        assert_eq!(config.seed.batch_size, 1000);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(CliConfig::discover(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
