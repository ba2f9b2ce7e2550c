//! Service configuration.
//!
//! Every value comes from the environment, with a `.env` file in the working
//! directory honoured for anything not already set.

use std::str::FromStr;

/// Runtime configuration shared by the binaries in this workspace.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name of the service, used in logs and response metadata.
    pub service_name: String,
    /// Address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Seconds to wait when acquiring a connection to the SQL engine.
    pub connect_timeout_secs: u64,
    /// Upper bound on pooled connections per datasource instance.
    pub max_connections: u32,
    /// Database to connect to on the SQL engine.
    pub database: String,
}

impl AppConfig {
    /// Loads the configuration for the named service.
    pub fn load_with_service(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            host: env_or("SERVER_HOST", "0.0.0.0".to_string()),
            port: env_or("SERVER_PORT", 8090),
            connect_timeout_secs: env_or("CONNECT_TIMEOUT_SECS", 10),
            max_connections: env_or("MAX_CONNECTIONS", 5),
            database: env_or("MATERIALIZE_DATABASE", "materialize".to_string()),
        }
    }
}

/// Where the plugin adapter reaches the backend service.
#[derive(Debug, Clone)]
pub struct ServiceUrls {
    pub backend: String,
}

impl ServiceUrls {
    pub fn load() -> Self {
        Self {
            backend: env_or("BACKEND_URL", "http://127.0.0.1:8090".to_string()),
        }
    }
}

/// Reads `key` from the environment, falling back to `default` when it is
/// unset or does not parse.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Load `.env` from the working directory (best-effort, no error if missing).
pub fn load_dotenv() {
    let Ok(content) = std::fs::read_to_string(".env") else {
        return;
    };
    for (key, value) in content.lines().filter_map(parse_dotenv_line) {
        // Only set if not already set by the environment
        if std::env::var(key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

fn parse_dotenv_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim().trim_matches('"')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_when_unset() {
        let port: u16 = env_or("MZ_DATASOURCE_TEST_UNSET_PORT", 6875);
        assert_eq!(port, 6875);
    }

    #[test]
    fn test_env_or_ignores_unparseable_values() {
        std::env::set_var("MZ_DATASOURCE_TEST_BAD_PORT", "not-a-port");
        let port: u16 = env_or("MZ_DATASOURCE_TEST_BAD_PORT", 8090);
        assert_eq!(port, 8090);
    }

    #[test]
    fn test_parse_dotenv_line() {
        assert_eq!(parse_dotenv_line("BACKEND_URL=http://x"), Some(("BACKEND_URL", "http://x")));
        assert_eq!(parse_dotenv_line(" KEY = \"quoted\" "), Some(("KEY", "quoted")));
        assert_eq!(parse_dotenv_line("# comment"), None);
        assert_eq!(parse_dotenv_line(""), None);
        assert_eq!(parse_dotenv_line("garbage"), None);
    }
}
