//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use profitboard_shared::constants::{DEFAULT_HTTP_PORT, MAX_PROOF_SIZE};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./profitboard.db`
    pub database_path: PathBuf,

    /// Base URL of the identity provider (`{AUTH_URL}/auth/v1/user`).
    /// Env: `AUTH_URL`
    /// Default: unset (nobody can sign in).
    pub auth_url: Option<String>,

    /// Public API key sent to the identity provider as `apikey`.
    /// Env: `AUTH_API_KEY`
    pub auth_api_key: Option<String>,

    /// Base URL of the object store used for proof images.
    /// Env: `STORAGE_URL`
    /// Default: unset (proof uploads are skipped).
    pub storage_url: Option<String>,

    /// Env: `STORAGE_API_KEY`
    pub storage_api_key: Option<String>,

    /// Env: `PROOF_BUCKET`
    /// Default: `proofs`
    pub proof_bucket: String,

    /// Maximum proof image size in bytes.
    /// Env: `MAX_PROOF_SIZE`
    /// Default: 10 MiB
    pub max_proof_size: usize,

    /// Break-glass admin passcode, matched against `x-admin-passcode`.
    /// Env: `ADMIN_PASSCODE`
    /// Default: empty (override disabled).
    pub admin_passcode: Option<String>,

    /// Sustained requests per second per client IP on mutating routes.
    /// Env: `RATE_LIMIT_PER_SEC`
    /// Default: `10`
    pub rate_limit_per_sec: f64,

    /// Burst size per client IP.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: `30`
    pub rate_limit_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./profitboard.db"),
            auth_url: None,
            auth_api_key: None,
            storage_url: None,
            storage_api_key: None,
            proof_bucket: "proofs".to_string(),
            max_proof_size: MAX_PROOF_SIZE,
            admin_passcode: None,
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn redact(secret: &Option<String>) -> &'static str {
            if secret.is_some() {
                "<redacted>"
            } else {
                "<unset>"
            }
        }

        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("auth_url", &self.auth_url)
            .field("auth_api_key", &redact(&self.auth_api_key))
            .field("storage_url", &self.storage_url)
            .field("storage_api_key", &redact(&self.storage_api_key))
            .field("proof_bucket", &self.proof_bucket)
            .field("max_proof_size", &self.max_proof_size)
            .field("admin_passcode", &redact(&self.admin_passcode))
            .field("rate_limit_per_sec", &self.rate_limit_per_sec)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = non_empty(var("DATABASE_PATH")) {
            config.database_path = PathBuf::from(path);
        }

        config.auth_url = non_empty(var("AUTH_URL"));
        config.auth_api_key = non_empty(var("AUTH_API_KEY"));
        config.storage_url = non_empty(var("STORAGE_URL"));
        config.storage_api_key = non_empty(var("STORAGE_API_KEY"));
        config.admin_passcode = non_empty(var("ADMIN_PASSCODE"));

        if let Some(bucket) = non_empty(var("PROOF_BUCKET")) {
            config.proof_bucket = bucket;
        }

        if let Some(val) = var("MAX_PROOF_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_proof_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_PROOF_SIZE, using default"),
            }
        }

        if let Some(val) = var("RATE_LIMIT_PER_SEC") {
            match val.parse::<f64>() {
                Ok(n) if n > 0.0 && n.is_finite() => config.rate_limit_per_sec = n,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_PER_SEC, using default"),
            }
        }

        if let Some(val) = var("RATE_LIMIT_BURST") {
            match val.parse::<f64>() {
                Ok(n) if n >= 1.0 && n.is_finite() => config.rate_limit_burst = n,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_BURST, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> ServerConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = load(&[]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.proof_bucket, "proofs");
        assert_eq!(config.max_proof_size, 10 * 1024 * 1024);
        assert!(config.admin_passcode.is_none());
        assert!(config.auth_url.is_none());
    }

    #[test]
    fn test_reads_overrides() {
        let config = load(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", "/var/lib/profitboard/db.sqlite"),
            ("AUTH_URL", "https://auth.example.com"),
            ("ADMIN_PASSCODE", "hunter2"),
            ("MAX_PROOF_SIZE", "1024"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(
            config.database_path,
            PathBuf::from("/var/lib/profitboard/db.sqlite")
        );
        assert_eq!(config.auth_url.as_deref(), Some("https://auth.example.com"));
        assert_eq!(config.admin_passcode.as_deref(), Some("hunter2"));
        assert_eq!(config.max_proof_size, 1024);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("MAX_PROOF_SIZE", "big"),
            ("RATE_LIMIT_BURST", "0"),
        ]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.max_proof_size, 10 * 1024 * 1024);
        assert_eq!(config.rate_limit_burst, 30.0);
    }

    #[test]
    fn test_blank_passcode_disables_override() {
        let config = load(&[("ADMIN_PASSCODE", "   ")]);
        assert!(config.admin_passcode.is_none());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&[
            ("ADMIN_PASSCODE", "hunter2"),
            ("AUTH_API_KEY", "anon-key-123"),
        ]);
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("anon-key-123"));
        assert!(printed.contains("<redacted>"));
    }
}
