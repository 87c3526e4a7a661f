use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Verifier configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname or IP address to bind to.
    pub host: String,
    /// Port number to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `.env`, a TOML file and the environment.
    ///
    /// Priority, highest first: `SERVER_*` environment variables (for example
    /// `SERVER_PORT=9000`), the TOML file, built-in defaults. The file path
    /// comes from `SERVER_CONFIG_PATH` and defaults to `config/server.toml`;
    /// a missing file is skipped.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> figment::error::Result<Self> {
        use figment::providers::{Env, Format, Serialized, Toml};
        use figment::Figment;

        let _ = dotenvy::dotenv();

        let config_path = std::env::var("SERVER_CONFIG_PATH")
            .unwrap_or_else(|_| "config/server.toml".to_string());

        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("SERVER_").only(&["host", "port"]))
            .extract()
    }

    /// Rejects values the verifier cannot start with.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host cannot be empty".to_string());
        }
        if self.port == 0 {
            return Err("port cannot be zero".to_string());
        }
        Ok(())
    }

    /// Resolves host and port into the address to listen on.
    pub async fn addr(&self) -> Result<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| Error::Config(format!("cannot resolve listen address {}:{}: {e}", self.host, self.port)))?;
        addrs.next().ok_or_else(|| {
            Error::Config(format!("listen address {}:{} has no addresses", self.host, self.port))
        })
    }
}
