//! Pre-flight checks for caplog
//!
//! Validates the inputs before any output is created, with actionable
//! messages for the usual mistakes.

use crate::config::RunConfig;
use anyhow::{bail, Result};
use std::path::Path;

/// Run all pre-flight checks
///
/// # Errors
///
/// The first failed check.
pub fn run_preflight_checks(config: &RunConfig) -> Result<()> {
    for file in &config.files {
        check_input_file(file)?;
    }
    if let Some(rules) = &config.rules {
        check_rules_file(rules)?;
    }
    check_output_dir(&config.output_dir)
}

/// Check that an input log or raw dump exists and is a regular file
fn check_input_file(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!(
            "No such input: {}\n\n\
             Pass text logs or raw dumps (raw/<source>.bin of an earlier run).",
            path.display()
        );
    }
    if !path.is_file() {
        bail!("Input is not a file: {}", path.display());
    }
    Ok(())
}

fn check_rules_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!(
            "No such rules file: {}\n\n\
             Omit --rules to use the built-in object class check.",
            path.display()
        );
    }
    Ok(())
}

/// The output directory may be missing (it is created) but must not be a file
fn check_output_dir(path: &Path) -> Result<()> {
    if path.exists() && !path.is_dir() {
        bail!("Output directory is a file: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_input() {
        let config = RunConfig { files: vec![PathBuf::from("/nonexistent/a.log")], ..RunConfig::default() };
        let err = run_preflight_checks(&config).unwrap_err();
        assert!(err.to_string().starts_with("No such input: /nonexistent/a.log"));
    }

    #[test]
    fn test_directory_as_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig { files: vec![dir.path().to_path_buf()], ..RunConfig::default() };
        assert!(run_preflight_checks(&config).unwrap_err().to_string().contains("not a file"));
    }

    #[test]
    fn test_output_dir_is_a_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = RunConfig { output_dir: file.path().to_path_buf(), ..RunConfig::default() };
        assert!(run_preflight_checks(&config).is_err());
    }

    #[test]
    fn test_missing_rules() {
        let config = RunConfig { rules: Some(PathBuf::from("/nonexistent/rules.json")), ..RunConfig::default() };
        assert!(run_preflight_checks(&config).unwrap_err().to_string().contains("rules file"));
    }

    #[test]
    fn test_defaults_pass() {
        assert!(run_preflight_checks(&RunConfig::default()).is_ok());
    }
}
