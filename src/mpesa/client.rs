//! HTTP client for the Safaricom Daraja API: OAuth token exchange and STK
//! push initiation, behind a circuit breaker so a flapping upstream does
//! not tie up request handlers.

use crate::mpesa::request::StkPushRequest;
use failsafe::futures::CircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DarajaError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("authentication with Daraja failed")]
    Unauthorized,
    #[error("Daraja API error {code}: {message}")]
    Api { code: String, message: String },
    #[error("invalid response from Daraja: {0}")]
    InvalidResponse(String),
    #[error("circuit breaker open - Daraja API unavailable")]
    CircuitBreakerOpen,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_in: String,
}

/// Response body from `/mpesa/stkpush/v1/processrequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    #[serde(rename = "CustomerMessage")]
    pub customer_message: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
    #[serde(rename = "errorMessage", default)]
    error_message: Option<String>,
}

pub struct DarajaClient {
    client: Client,
    base_url: String,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>,
}

impl DarajaClient {
    pub fn new(base_url: String) -> Self {
        Self::with_circuit_breaker_config(base_url, 5, Duration::from_secs(60))
    }

    pub fn with_circuit_breaker_config(
        base_url: String,
        failure_threshold: u32,
        reset_timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::exponential(Duration::from_secs(10), reset_timeout);
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        DarajaClient {
            client,
            base_url,
            circuit_breaker,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Client-credentials OAuth exchange. The token is short-lived and not
    /// cached here; callers fetch one per push.
    pub async fn get_access_token(
        &self,
        consumer_key: &str,
        consumer_secret: &str,
    ) -> Result<AccessToken, DarajaError> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.base_url.trim_end_matches('/')
        );
        let client = self.client.clone();
        let key = consumer_key.to_string();
        let secret = consumer_secret.to_string();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .get(&url)
                    .basic_auth(key, Some(secret))
                    .send()
                    .await?;

                if response.status() == 401 || response.status() == 403 {
                    return Err(DarajaError::Unauthorized);
                }
                if !response.status().is_success() {
                    return Err(DarajaError::InvalidResponse(format!(
                        "token endpoint returned {}",
                        response.status()
                    )));
                }

                let token = response.json::<AccessToken>().await?;
                Ok(token)
            })
            .await;

        match result {
            Ok(token) => Ok(token),
            Err(FailsafeError::Rejected) => Err(DarajaError::CircuitBreakerOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    /// Posts a push-payment request. Upstream acknowledges synchronously;
    /// the payment outcome arrives later on the callback endpoint.
    pub async fn initiate_stk_push(
        &self,
        access_token: &str,
        request: &StkPushRequest,
    ) -> Result<StkPushResponse, DarajaError> {
        let url = format!(
            "{}/mpesa/stkpush/v1/processrequest",
            self.base_url.trim_end_matches('/')
        );
        let client = self.client.clone();
        let token = access_token.to_string();
        let body = request.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .bearer_auth(token)
                    .json(&body)
                    .send()
                    .await?;

                if response.status() == 401 || response.status() == 403 {
                    return Err(DarajaError::Unauthorized);
                }

                if !response.status().is_success() {
                    let error_body = response.json::<ApiErrorBody>().await.unwrap_or(ApiErrorBody {
                        error_code: None,
                        error_message: None,
                    });
                    return Err(DarajaError::Api {
                        code: error_body.error_code.unwrap_or_else(|| "unknown".to_string()),
                        message: error_body
                            .error_message
                            .unwrap_or_else(|| "no error detail".to_string()),
                    });
                }

                let push_response = response.json::<StkPushResponse>().await?;
                if push_response.response_code != "0" {
                    return Err(DarajaError::Api {
                        code: push_response.response_code.clone(),
                        message: push_response.response_description.clone(),
                    });
                }
                Ok(push_response)
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(FailsafeError::Rejected) => Err(DarajaError::CircuitBreakerOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

impl Clone for DarajaClient {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            circuit_breaker: self.circuit_breaker.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = DarajaClient::new("https://sandbox.safaricom.co.ke".to_string());
        assert_eq!(client.base_url(), "https://sandbox.safaricom.co.ke");
    }
}
