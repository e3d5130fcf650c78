//! Loading `lgdesk.toml` and applying environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use lgdesk_orchestrator::Settings;
use thiserror::Error;

/// Looked up in the working directory when `--config` is not given.
pub(crate) const DEFAULT_CONFIG: &str = "lgdesk.toml";

pub(crate) const BASE_URL_VAR: &str = "LGDESK_BASE_URL";
pub(crate) const TOKEN_VAR: &str = "LGDESK_TOKEN";

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("could not read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },
    #[error("no authority configured: set [authority] base_url in lgdesk.toml or LGDESK_BASE_URL")]
    MissingBaseUrl,
}

/// Load settings from the process environment.
pub(crate) fn load(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    load_with(explicit, |key| std::env::var(key).ok())
}

/// Load settings, reading environment variables through `env`.
///
/// An explicit path must exist. Without one, `lgdesk.toml` is used when
/// present and defaults otherwise. Non-empty environment values win over
/// the file.
pub(crate) fn load_with<F>(explicit: Option<&Path>, env: F) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = match explicit {
        Some(path) => read(path)?,
        None => {
            let fallback = Path::new(DEFAULT_CONFIG);
            if fallback.is_file() {
                read(fallback)?
            } else {
                Settings::default()
            }
        }
    };

    if let Some(url) = env(BASE_URL_VAR).filter(|v| !v.trim().is_empty()) {
        settings.authority.base_url = url;
    }
    if let Some(token) = env(TOKEN_VAR).filter(|v| !v.trim().is_empty()) {
        settings.authority.token = Some(token);
    }

    if settings.authority.base_url.trim().is_empty() {
        return Err(ConfigError::MissingBaseUrl);
    }
    Ok(settings)
}

fn read(path: &Path) -> Result<Settings, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn write_config(dir: &tempfile::TempDir, text: &str) -> PathBuf {
        let path = dir.path().join("lgdesk.toml");
        fs::write(&path, text).unwrap();
        path
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn reads_both_tables() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[authority]
base_url = "https://lg.example.com/api/v1"
token = "file-token"

[orchestrator]
letter_open_delay_ms = 250
open_letters = false
"#,
        );

        let settings = load_with(Some(&path), no_env).unwrap();

        assert_eq!(settings.authority.base_url, "https://lg.example.com/api/v1");
        assert_eq!(settings.authority.token.as_deref(), Some("file-token"));
        assert_eq!(settings.orchestrator.letter_open_delay_ms, 250);
        assert!(!settings.orchestrator.open_letters);
    }

    #[test]
    fn environment_wins_over_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "[authority]\nbase_url = \"https://file.example.com\"\ntoken = \"file-token\"\n",
        );
        let env: HashMap<&str, &str> = [
            (BASE_URL_VAR, "https://env.example.com"),
            (TOKEN_VAR, "env-token"),
        ]
        .into_iter()
        .collect();

        let settings = load_with(Some(&path), |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(settings.authority.base_url, "https://env.example.com");
        assert_eq!(settings.authority.token.as_deref(), Some("env-token"));
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(&dir, "[authority]\nbase_url = \"https://file.example.com\"\n");

        let settings = load_with(Some(&path), |_| Some("  ".to_string())).unwrap();

        assert_eq!(settings.authority.base_url, "https://file.example.com");
        assert_eq!(settings.authority.token, None);
    }

    #[test]
    fn environment_alone_is_enough() {
        let settings = load_with(Some(Path::new("/nonexistent/lgdesk.toml")), no_env);
        assert!(matches!(settings, Err(ConfigError::Read { .. })));

        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(&dir, "");
        let settings = load_with(Some(&path), |k| {
            (k == BASE_URL_VAR).then(|| "http://127.0.0.1:9".to_string())
        })
        .unwrap();
        assert_eq!(settings.authority.base_url, "http://127.0.0.1:9");
        assert!(settings.orchestrator.open_letters);
    }

    #[test]
    fn missing_base_url_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(&dir, "[orchestrator]\nopen_letters = true\n");

        let err = load_with(Some(&path), no_env).unwrap_err();

        assert!(matches!(err, ConfigError::MissingBaseUrl));
        assert!(err.to_string().contains(BASE_URL_VAR));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_config(&dir, "[authority]\nbase_url = \"https://x\"\nretries = 3\n");

        let err = load_with(Some(&path), no_env).unwrap_err();

        match err {
            ConfigError::Parse { message, .. } => assert!(message.contains("retries")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
