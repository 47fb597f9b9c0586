//! Configuration loader with environment variable expansion

use super::{Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content)?;
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand `${VAR_NAME}` and `${VAR_NAME:-default}`.
    ///
    /// A variable that is unset and has no default keeps its placeholder.
    fn expand_env_vars(content: &str) -> Result<String, ConfigError> {
        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        let mut result = String::with_capacity(content.len());
        let mut last_match = 0;

        for cap in re.captures_iter(content) {
            let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
                continue;
            };

            result.push_str(&content[last_match..full_match.start()]);

            let value = match std::env::var(var_name.as_str()) {
                Ok(val) => val,
                Err(_) => match cap.get(2) {
                    Some(default) => default.as_str().to_string(),
                    None => full_match.as_str().to_string(),
                },
            };
            result.push_str(&value);

            last_match = full_match.end();
        }

        result.push_str(&content[last_match..]);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_expand_env_vars() {
        std::env::set_var("SKYLIB_TEST_VAR", "test_value");
        let content = "key: ${SKYLIB_TEST_VAR}";
        let expanded = ConfigLoader::expand_env_vars(content).unwrap();
        assert_eq!(expanded, "key: test_value");
        std::env::remove_var("SKYLIB_TEST_VAR");
    }

    #[test]
    #[serial]
    fn test_expand_env_vars_default() {
        std::env::remove_var("SKYLIB_MISSING_VAR");
        let expanded =
            ConfigLoader::expand_env_vars("a: ${SKYLIB_MISSING_VAR:-fallback}\nb: ${SKYLIB_MISSING_VAR:-}")
                .unwrap();
        assert_eq!(expanded, "a: fallback\nb: ");
    }

    #[test]
    #[serial]
    fn test_expand_env_vars_keeps_unknown_placeholder() {
        std::env::remove_var("SKYLIB_MISSING_VAR");
        let expanded = ConfigLoader::expand_env_vars("x: ${SKYLIB_MISSING_VAR}").unwrap();
        assert_eq!(expanded, "x: ${SKYLIB_MISSING_VAR}");
    }

    #[test]
    #[serial]
    fn test_from_yaml() {
        std::env::set_var("SKYLIB_TEST_CSRF", "tok-123");
        let yaml = r#"
backend:
  base_url: "https://library.example.com"
  language: "uk"
  csrf_token: "${SKYLIB_TEST_CSRF}"
  timeout_seconds: 15
upload:
  mode: direct
logging:
  level: debug
  format: json
"#;
        let config = ConfigLoader::from_yaml(yaml).unwrap();
        std::env::remove_var("SKYLIB_TEST_CSRF");

        assert_eq!(config.backend.base_url, "https://library.example.com");
        assert_eq!(config.backend.language, "uk");
        assert_eq!(config.backend.csrf_token, "tok-123");
        assert_eq!(
            config.backend.timeout(),
            Some(std::time::Duration::from_secs(15))
        );
        assert_eq!(config.upload.mode, crate::config::UploadMode::Direct);
        assert_eq!(config.logging.format, "json");
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_from_yaml_rejects_invalid() {
        let yaml = "backend:\n  base_url: \"library.example.com\"\n";
        assert!(matches!(
            ConfigLoader::from_yaml(yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
