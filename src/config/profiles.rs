use serde::{Deserialize, Serialize};

/// Which Daraja environment the process (and a tenant's credentials) target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MpesaEnvironment {
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    pub fn from_env() -> Self {
        std::env::var("MPESA_ENV")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "sandbox" | "sand" => Some(Self::Sandbox),
                "production" | "prod" => Some(Self::Production),
                _ => None,
            })
            .unwrap_or(Self::Sandbox)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }
}

impl std::str::FromStr for MpesaEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            other => Err(format!("unknown mpesa environment: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentDefaults {
    pub server_port: u16,
    pub database_url: Option<String>,
    pub daraja_base_url: String,
}

impl EnvironmentDefaults {
    pub fn for_environment(environment: MpesaEnvironment) -> Self {
        match environment {
            MpesaEnvironment::Sandbox => Self {
                server_port: 3000,
                database_url: None,
                daraja_base_url: "https://sandbox.safaricom.co.ke".to_string(),
            },
            MpesaEnvironment::Production => Self {
                server_port: 8080,
                database_url: None,
                daraja_base_url: "https://api.safaricom.co.ke".to_string(),
            },
        }
    }
}
