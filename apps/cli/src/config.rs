//! Transfer settings for the command-line tool.
//!
//! Read from the JSON file given with `--config`. Missing fields take their
//! defaults; an unreadable or invalid file falls back to defaults entirely.

use std::path::Path;

use anyhow::Context;
use oftlink_transfer::TransferConfig;

/// Loads settings from `path`, or defaults when no path is given.
pub fn load(path: Option<&Path>) -> TransferConfig {
    let Some(path) = path else {
        return TransferConfig::default();
    };
    match read(path) {
        Ok(config) => {
            tracing::info!(
                path = %path.display(),
                chunk_size = config.chunk_size,
                policy = ?config.checksum_policy,
                "configuration loaded"
            );
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %format!("{e:#}"),
                "failed to load config, using defaults"
            );
            TransferConfig::default()
        }
    }
}

fn read(path: &Path) -> anyhow::Result<TransferConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    TransferConfig::from_json(&content).context("parsing transfer config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use oftlink_transfer::ChecksumPolicy;

    #[test]
    fn no_path_gives_defaults() {
        assert_eq!(load(None), TransferConfig::default());
    }

    #[test]
    fn reads_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oftlink.json");
        std::fs::write(&path, r#"{"checksumPolicy": "lenient", "allowResume": false}"#).unwrap();

        let config = load(Some(&path));
        assert_eq!(config.checksum_policy, ChecksumPolicy::Lenient);
        assert!(!config.allow_resume);
        assert_eq!(config.chunk_size, 256);
    }

    #[test]
    fn invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load(Some(&path)), TransferConfig::default());
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            load(Some(&dir.path().join("absent.json"))),
            TransferConfig::default()
        );
    }
}
