//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read and parse a TOML file without validating it.
///
/// The binary applies command-line overrides before validation, so parsing
/// and checking are separate steps.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::validation::validate_config;
    use std::path::PathBuf;

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("tally-proxy-{}-{}.toml", name, std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_valid_file() {
        let path = write_temp(
            "valid",
            r#"
            [listener]
            bind_address = "127.0.0.1:9999"

            [pool]
            capacity = 3
            "#,
        );

        let config = read_config(&path).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
        assert_eq!(config.pool.capacity, 3);

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn parsed_file_still_needs_validation() {
        let path = write_temp("invalid", "[backend]\naddress = \"no-port\"\n");

        let config = read_config(&path).unwrap();
        let error = validate_config(&config).map_err(ConfigError::Validation).unwrap_err();
        match &error {
            ConfigError::Validation(errors) => {
                assert_eq!(errors, &vec![ValidationError::BackendAddress("no-port".into())]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(error.to_string().starts_with("Validation failed: "));

        fs::remove_file(path).unwrap();
    }

    #[test]
    fn reports_parse_failures() {
        let path = write_temp("garbled", "[pool\ncapacity = ");
        assert!(matches!(read_config(&path), Err(ConfigError::Parse(_))));
        fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join("tally-proxy-does-not-exist.toml");
        assert!(matches!(read_config(&path), Err(ConfigError::Io(_))));
    }
}
