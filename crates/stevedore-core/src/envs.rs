//! Environment variable helpers: env-file loading and log masking.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ValidationError;

/// Read `KEY=VALUE` lines from each file, appending them in order.
///
/// Files are checked for existence up front so a typo fails the deploy
/// before anything is scheduled. Blank lines are skipped.
pub fn load_env_files(paths: &[PathBuf]) -> Result<Vec<String>, ValidationError> {
    let mut envs = Vec::new();
    for path in paths {
        envs.extend(load_env_file(path)?);
    }
    Ok(envs)
}

fn load_env_file(path: &Path) -> Result<Vec<String>, ValidationError> {
    if !path.exists() {
        return Err(ValidationError::EnvFileMissing(path.to_path_buf()));
    }

    debug!(path = %path.display(), "reading environment file");
    let content =
        std::fs::read_to_string(path).map_err(|source| ValidationError::EnvFileRead {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// Replace the value of any env whose key mentions `pass` with `*****`.
///
/// Keeps deploy logs free of credentials without hiding which keys were set.
pub fn mask_envs(envs: &[String]) -> Vec<String> {
    envs.iter()
        .map(|entry| {
            let key = entry.split('=').next().unwrap_or(entry);
            if key.to_ascii_lowercase().contains("pass") {
                format!("{key}=*****")
            } else {
                entry.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn masks_only_password_keys() {
        let envs = vec![
            "PASSWORD=secret".to_string(),
            "db_passphrase=topsecret".to_string(),
            "USER=alice".to_string(),
        ];
        assert_eq!(
            mask_envs(&envs),
            vec!["PASSWORD=*****", "db_passphrase=*****", "USER=alice"]
        );
    }

    #[test]
    fn masks_entry_without_equals() {
        let envs = vec!["passkey".to_string()];
        assert_eq!(mask_envs(&envs), vec!["passkey=*****"]);
    }

    #[test]
    fn loads_lines_in_order_across_files() {
        let mut first = tempfile::NamedTempFile::new().unwrap();
        writeln!(first, "A=1").unwrap();
        writeln!(first).unwrap();
        writeln!(first, "B=2").unwrap();

        let mut second = tempfile::NamedTempFile::new().unwrap();
        writeln!(second, "C=3").unwrap();

        let envs = load_env_files(&[
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ])
        .unwrap();
        assert_eq!(envs, vec!["A=1", "B=2", "C=3"]);
    }

    #[test]
    fn missing_file_is_a_validation_error() {
        let result = load_env_files(&[PathBuf::from("/nonexistent/envfile")]);
        assert!(matches!(result, Err(ValidationError::EnvFileMissing(_))));
    }
}
