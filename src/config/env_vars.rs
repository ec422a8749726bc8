use std::path::{Path, PathBuf};

use log::debug;

use crate::config::ConfigurationError;
use crate::constants::DEFAULT_ENV_FILE;

/// Read a variable from the process environment.
///
/// Unset variables, variables holding invalid unicode and variables set to
/// the empty string all come back as `None`, so `FOO=` in a `.env` file
/// behaves like leaving `FOO` out.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Seed the process environment from a dotenv file.
///
/// An explicitly requested file must exist. Without one, `.env` in the
/// working directory is loaded if present and silently skipped otherwise.
/// Variables already set in the environment win over the file.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigurationError> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_ENV_FILE), false),
    };

    if !explicit && !path.exists() {
        debug!("No {} file found, using process environment only", path.display());
        return Ok(None);
    }

    dotenvy::from_path(&path).map_err(|e| ConfigurationError::EnvFile {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    debug!("Loaded environment from {}", path.display());
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_missing_env_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.env");

        let result = load_env_file(Some(&missing));
        assert!(matches!(result, Err(ConfigurationError::EnvFile { .. })));
    }

    #[test]
    fn test_explicit_env_file_is_loaded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup.env");
        fs::write(&path, "ROUTEROS_BACKUP_TEST_ENV_FILE_VAR=loaded\n").unwrap();

        let loaded = load_env_file(Some(&path)).unwrap();
        assert_eq!(loaded, Some(path));
        assert_eq!(
            process_env("ROUTEROS_BACKUP_TEST_ENV_FILE_VAR").as_deref(),
            Some("loaded")
        );

        std::env::remove_var("ROUTEROS_BACKUP_TEST_ENV_FILE_VAR");
    }

    #[test]
    fn test_empty_variable_reads_as_unset() {
        std::env::set_var("ROUTEROS_BACKUP_TEST_EMPTY_VAR", "");
        assert_eq!(process_env("ROUTEROS_BACKUP_TEST_EMPTY_VAR"), None);
        std::env::remove_var("ROUTEROS_BACKUP_TEST_EMPTY_VAR");
    }
}
