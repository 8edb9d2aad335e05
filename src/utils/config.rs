use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use anyhow::{Result, Context};
use tracing::{debug, info};

pub const DB_PATH_KEY: &str = "SPARKIFY_DB_PATH";
pub const SONG_DATA_KEY: &str = "SONG_DATA_DIR";
pub const LOG_DATA_KEY: &str = "LOG_DATA_DIR";

#[derive(Debug, Clone, PartialEq)]
pub struct EtlConfig {
    pub db_path: PathBuf,
    pub song_data: PathBuf,
    pub log_data: PathBuf,
}

impl Default for EtlConfig {
    fn default() -> Self {
        EtlConfig {
            db_path: PathBuf::from("sparkify.db"),
            song_data: PathBuf::from("data/song_data"),
            log_data: PathBuf::from("data/log_data"),
        }
    }
}

/// Built-in defaults, overridden by whatever the env file sets.
/// A missing env file is not an error.
pub fn load_config(env_path: &Path) -> Result<EtlConfig> {
    let mut config = EtlConfig::default();

    if !env_path.exists() {
        debug!("No {} found, using default paths", env_path.display());
        return Ok(config);
    }

    load_from_env(env_path, &mut config)
        .with_context(|| format!("Failed to read config from {}", env_path.display()))?;
    info!("Loaded configuration from {}", env_path.display());
    Ok(config)
}

fn load_from_env(path: &Path, config: &mut EtlConfig) -> Result<()> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = PathBuf::from(value.trim());
            match key.trim() {
                DB_PATH_KEY => config.db_path = value,
                SONG_DATA_KEY => config.song_data = value,
                LOG_DATA_KEY => config.log_data = value,
                other => debug!("Ignoring unknown config key {}", other),
            }
        }
    }
    Ok(())
}

pub fn save_to_env(path: &Path, config: &EtlConfig) -> Result<()> {
    let mut file = File::create(path).context("Failed to create .env file")?;
    writeln!(file, "{}={}", DB_PATH_KEY, config.db_path.display())?;
    writeln!(file, "{}={}", SONG_DATA_KEY, config.song_data.display())?;
    writeln!(file, "{}={}", LOG_DATA_KEY, config.log_data.display())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_env() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(".env");
        let config = EtlConfig {
            db_path: PathBuf::from("/tmp/sparkify.db"),
            song_data: PathBuf::from("/data/song_data"),
            log_data: PathBuf::from("/data/log_data"),
        };

        save_to_env(&path, &config)?;

        let content = fs::read_to_string(&path)?;
        assert!(content.contains("SPARKIFY_DB_PATH=/tmp/sparkify.db"));
        assert!(content.contains("LOG_DATA_DIR=/data/log_data"));

        let loaded = load_config(&path)?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn partial_env_keeps_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(".env");
        fs::write(&path, "# local overrides\n\nSONG_DATA_DIR = fixtures/songs\nUNRELATED=1\n")?;

        let loaded = load_config(&path)?;
        assert_eq!(loaded.song_data, PathBuf::from("fixtures/songs"));
        assert_eq!(loaded.db_path, EtlConfig::default().db_path);
        assert_eq!(loaded.log_data, EtlConfig::default().log_data);
        Ok(())
    }

    #[test]
    fn missing_env_file_uses_defaults() -> Result<()> {
        let loaded = load_config(Path::new("/definitely/missing/.env"))?;
        assert_eq!(loaded, EtlConfig::default());
        Ok(())
    }
}
