//! Typed environment-variable configuration, assembled once at startup.
//!
//! Shape follows `ingest_config.rs`'s typed-config-struct convention; load
//! failure panics with a clear message the same way `main.rs` does for
//! `DATABASE_URL`, since a misconfigured process should fail fast rather than
//! limp along with `None` credentials it never warns about.

use std::env;

fn default_opensky_api_url() -> String {
    "https://opensky-network.org/api".to_string()
}

fn default_opensky_tracks_api_url() -> String {
    "https://opensky-network.org/api/tracks".to_string()
}

fn default_aviationstack_api_url() -> String {
    "http://api.aviationstack.com/v1".to_string()
}

fn default_elevation_api_url() -> String {
    "https://api.open-elevation.com/api/v1/lookup".to_string()
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub interface: String,
    pub byok_enabled: bool,
    pub opensky_client_id: Option<String>,
    pub opensky_client_secret: Option<String>,
    pub opensky_api_url: String,
    pub opensky_tracks_api_url: String,
    pub aviationstack_api_key: Option<String>,
    pub aviationstack_api_url: String,
    pub elevation_api_url: String,
    pub sentry_dsn: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables. CLI flags (see
    /// `main.rs`) may override `port`/`interface` after this call returns.
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        let byok_enabled = env::var("BYOK")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            port,
            interface: env::var("INTERFACE").unwrap_or_else(|_| "0.0.0.0".to_string()),
            byok_enabled,
            opensky_client_id: env::var("OPENSKY_CLIENT_ID").ok(),
            opensky_client_secret: env::var("OPENSKY_CLIENT_SECRET").ok(),
            opensky_api_url: env::var("OPENSKY_API_URL").unwrap_or_else(|_| default_opensky_api_url()),
            opensky_tracks_api_url: env::var("OPENSKY_TRACKS_API_URL")
                .unwrap_or_else(|_| default_opensky_tracks_api_url()),
            aviationstack_api_key: env::var("AVIATIONSTACK_API_KEY").ok(),
            aviationstack_api_url: env::var("AVIATIONSTACK_API_URL")
                .unwrap_or_else(|_| default_aviationstack_api_url()),
            elevation_api_url: env::var("ELEVATION_API_URL").unwrap_or_else(|_| default_elevation_api_url()),
            sentry_dsn: env::var("SENTRY_DSN").ok(),
        }
    }

    pub fn has_opensky_credentials(&self) -> bool {
        self.opensky_client_id.is_some() && self.opensky_client_secret.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byok_accepts_common_truthy_spellings() {
        for value in ["1", "true", "TRUE", "yes"] {
            unsafe {
                env::set_var("BYOK", value);
            }
            assert!(AppConfig::from_env().byok_enabled, "value={value}");
        }
        unsafe {
            env::remove_var("BYOK");
        }
    }

    #[test]
    fn byok_defaults_to_disabled() {
        unsafe {
            env::remove_var("BYOK");
        }
        assert!(!AppConfig::from_env().byok_enabled);
    }
}
