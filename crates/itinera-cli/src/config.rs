use std::path::Path;
use std::path::PathBuf;

use itinera_core::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("itinera").join("config.toml"))
}

/// An explicit path must exist. The default location is optional and falls
/// back to built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => load_from_path(path),
        None => match default_config_path() {
            Some(path) if path.exists() => load_from_path(&path),
            _ => Ok(Config::default()),
        },
    }
}

pub fn load_from_path(path: &Path) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use itinera_core::config::ModelProvider;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[model]\nprovider = \"scripted\"\nscript = \"demo.yaml\"\n\n[view]\ntimeline_settle_ms = 150\n",
        )
        .expect("write config");

        let config = load_config(Some(&path)).expect("load");

        assert_eq!(config.model.provider, ModelProvider::Scripted);
        assert_eq!(config.model.script, Some(PathBuf::from("demo.yaml")));
        assert_eq!(config.view.timeline_settle_ms, 150);
        assert!(config.view.show_timeline);
        assert_eq!(config.view.log_capacity, 500);
        assert_eq!(config.export.directory, None);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_config(Some(&dir.path().join("nope.toml"))).expect_err("missing");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn invalid_toml_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[view\n").expect("write config");
        let err = load_config(Some(&path)).expect_err("invalid");
        assert!(err.to_string().contains("config.toml"));
    }
}
