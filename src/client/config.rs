use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Prover configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Verifier host to connect to.
    pub host: String,
    /// Verifier port.
    pub port: u16,
    /// PEM certificate sent during the handshake.
    pub cert: PathBuf,
    /// PEM PKCS#8 private key matching `cert`.
    pub key: PathBuf,
    /// Send deadline in milliseconds.
    pub timeout: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cert: PathBuf::from("./eccert.pem"),
            key: PathBuf::from("./ecpriv.pem"),
            timeout: 1000,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from `.env`, a TOML file and the environment.
    ///
    /// Priority, highest first: `CLIENT_*` environment variables
    /// (`CLIENT_HOST`, `CLIENT_PORT`, `CLIENT_CERT`, `CLIENT_KEY`,
    /// `CLIENT_TIMEOUT`), the TOML file named by `CLIENT_CONFIG_PATH`
    /// (default `config/client.toml`, skipped when missing), built-in
    /// defaults.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> figment::error::Result<Self> {
        use figment::providers::{Env, Format, Serialized, Toml};
        use figment::Figment;

        let _ = dotenvy::dotenv();

        let config_path = std::env::var("CLIENT_CONFIG_PATH")
            .unwrap_or_else(|_| "config/client.toml".to_string());

        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("CLIENT_").only(&["host", "port", "cert", "key", "timeout"]))
            .extract()
    }

    /// Rejects values the prover cannot start with.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("host cannot be empty".to_string());
        }
        if self.port == 0 {
            return Err("port cannot be zero".to_string());
        }
        if self.timeout == 0 {
            return Err("send timeout cannot be zero".to_string());
        }
        if !self.cert.exists() {
            return Err(format!(
                "certificate file does not exist: {}",
                self.cert.display()
            ));
        }
        if !self.key.exists() {
            return Err(format!("key file does not exist: {}", self.key.display()));
        }
        Ok(())
    }

    /// Resolves the verifier address. `host` may be an IP address or a name.
    pub async fn addr(&self) -> Result<SocketAddr> {
        let mut addrs = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| Error::Config(format!("cannot resolve verifier {}:{}: {e}", self.host, self.port)))?;
        addrs.next().ok_or_else(|| {
            Error::Config(format!("verifier {}:{} has no addresses", self.host, self.port))
        })
    }

    /// Send deadline for each outgoing line.
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}
