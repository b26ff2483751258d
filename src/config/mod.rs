pub mod profiles;

use dotenvy::dotenv;
use profiles::{EnvironmentDefaults, MpesaEnvironment};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub mpesa_environment: MpesaEnvironment,
    pub daraja_base_url: String,
    /// 64-char hex AES-256 key, or an arbitrary passphrase to derive one from.
    pub encryption_key: String,
    /// Public base URL Daraja posts callbacks to.
    pub callback_base_url: String,
}

#[derive(Debug)]
pub struct ConfigInfo {
    pub config: Config,
    pub environment: MpesaEnvironment,
    pub overrides: Vec<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<ConfigInfo> {
        dotenv().ok();

        let environment = MpesaEnvironment::from_env();
        let defaults = EnvironmentDefaults::for_environment(environment);
        let mut overrides = Vec::new();

        let server_port = match env::var("SERVER_PORT") {
            Ok(v) => {
                let port: u16 = v
                    .parse()
                    .map_err(|_| anyhow::anyhow!("SERVER_PORT is not a valid port: {v}"))?;
                overrides.push("SERVER_PORT".to_string());
                port
            }
            Err(_) => defaults.server_port,
        };

        let database_url = env::var("DATABASE_URL").or_else(|_| {
            defaults
                .database_url
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))
        })?;
        if env::var("DATABASE_URL").is_ok() {
            overrides.push("DATABASE_URL".to_string());
        }

        let daraja_base_url = env::var("DARAJA_BASE_URL")
            .ok()
            .map(|v| {
                overrides.push("DARAJA_BASE_URL".to_string());
                v
            })
            .unwrap_or(defaults.daraja_base_url);

        // Key material is mandatory; refusing to start beats storing
        // plaintext credentials.
        let encryption_key = env::var("ENCRYPTION_KEY")
            .map_err(|_| anyhow::anyhow!("ENCRYPTION_KEY must be set"))?;

        let callback_base_url = env::var("CALLBACK_BASE_URL")
            .map_err(|_| anyhow::anyhow!("CALLBACK_BASE_URL must be set"))?;

        Ok(ConfigInfo {
            config: Config {
                server_port,
                database_url,
                mpesa_environment: environment,
                daraja_base_url,
                encryption_key,
                callback_base_url,
            },
            environment,
            overrides,
        })
    }

    /// Builds the codec from configured key material. Raw 64-char hex is
    /// used as-is; anything else is treated as a passphrase and hashed.
    pub fn credential_codec(&self) -> anyhow::Result<crate::crypto::CredentialCodec> {
        if self.encryption_key.len() == 64 && hex::decode(&self.encryption_key).is_ok() {
            crate::crypto::CredentialCodec::from_hex_key(&self.encryption_key)
        } else {
            Ok(crate::crypto::CredentialCodec::from_passphrase(
                &self.encryption_key,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process-global, so this is the only test
    // in the crate that touches them.
    #[test]
    fn test_unparseable_server_port_fails_fast() {
        env::set_var("DATABASE_URL", "postgres://localhost/tabpay_test");
        env::set_var("ENCRYPTION_KEY", "test-passphrase");
        env::set_var("CALLBACK_BASE_URL", "https://pay.example.com");

        env::set_var("SERVER_PORT", "not-a-port");
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("SERVER_PORT"));

        env::set_var("SERVER_PORT", "8099");
        let info = Config::from_env().unwrap();
        assert_eq!(info.config.server_port, 8099);
        assert!(info.overrides.contains(&"SERVER_PORT".to_string()));

        env::remove_var("SERVER_PORT");
    }
}
