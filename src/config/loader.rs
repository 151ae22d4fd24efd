//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parse a configuration document.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::InstanceSelection;
    use std::time::Duration;

    #[test]
    fn parses_full_document() {
        let config = parse_config(
            r#"
            port = 9000
            log_level = "debug"

            [rate_limit]
            enabled = true
            requests = 5
            interval = "1s"

            [auth]
            enabled = true
            type = "jwt"
            [auth.jwt]
            secret_key = "s3cret"

            [service_discovery]
            enabled = true
            type = "consul"
            selection = "random"
            [service_discovery.consul]
            address = "http://consul:8500"

            [[routes]]
            path = "/api/users"
            service_name = "user-service"
            timeout = "1s"

            [[routes]]
            path = "/static"
            target_url = "http://127.0.0.1:3000"
            timeout = "500ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.interval, Duration::from_secs(1));
        assert_eq!(config.auth.auth_type, "jwt");
        assert_eq!(config.auth.jwt.secret_key, "s3cret");
        assert_eq!(config.service_discovery.selection, InstanceSelection::Random);
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[0].service_name.as_deref(), Some("user-service"));
        assert_eq!(config.routes[1].target_url.as_deref(), Some("http://127.0.0.1:3000"));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(parse_config("port = [oops"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn non_positive_rate_limits_still_parse() {
        for doc in [
            "[rate_limit]\nenabled = true\nrequests = -1\ninterval = \"1s\"\n",
            "[rate_limit]\nenabled = true\nrequests = 0\ninterval = \"1s\"\n",
        ] {
            let config = parse_config(doc).unwrap();
            assert!(config.rate_limit.requests <= 0, "{doc}");
        }

        let config = parse_config("[rate_limit]\nrequests = 10\ninterval = \"-5s\"\n").unwrap();
        assert_eq!(config.rate_limit.interval, Duration::ZERO);
        let config = parse_config("[rate_limit]\ninterval = \"0s\"\n").unwrap();
        assert_eq!(config.rate_limit.interval, Duration::ZERO);
    }

    #[test]
    fn garbage_interval_is_still_rejected() {
        assert!(parse_config("[rate_limit]\ninterval = \"soon\"\n").is_err());
    }

    #[test]
    fn shipped_sample_parses() {
        let config = parse_config(include_str!("../../config/gateway.toml")).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.routes.len(), 3);
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = std::env::temp_dir().join("edge-gateway-does-not-exist.toml");
        assert!(matches!(load_config(&path), Err(ConfigError::Io(_))));
    }
}
