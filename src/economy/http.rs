//! Economy provider backed by a remote HTTP ledger.
use reqwest::{blocking::Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::jobs::types::PlayerId;

use super::{
    bridge::{EconomyError, EconomyService, Receipt},
    config::{HttpEconomyConfig, HttpEconomyConfigError},
};

/// Blocking client with a request timeout. Timeouts and transport errors
/// surface as `ServiceUnavailable`.
pub struct HttpEconomyService {
    http: Client,
    config: HttpEconomyConfig,
}

impl HttpEconomyService {
    pub fn new(config: HttpEconomyConfig) -> Result<Self, HttpEconomyConfigError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| HttpEconomyConfigError::ClientBuild(err.to_string()))?;
        Ok(Self { http, config })
    }

    fn authorise(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl EconomyService for HttpEconomyService {
    fn provider_name(&self) -> &str {
        "http"
    }

    fn get_or_create_account(&self, player: &PlayerId) -> Result<(), EconomyError> {
        let url = self.config.account_url(player.as_str(), None);
        let response = self
            .authorise(self.http.put(url))
            .send()
            .map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(player, status, &response.text().unwrap_or_default()))
        }
    }

    fn deposit(
        &self,
        player: &PlayerId,
        amount: f64,
        currency: &str,
        reason: &str,
    ) -> Result<Receipt, EconomyError> {
        let payload = DepositRequest {
            amount,
            currency,
            reason,
        };
        let url = self.config.account_url(player.as_str(), Some("deposits"));
        let response = self
            .authorise(self.http.post(url))
            .json(&payload)
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(player, status, &response.text().unwrap_or_default()));
        }

        let body: DepositResponse = response
            .json()
            .map_err(|err| EconomyError::unavailable(format!("malformed response: {err}")))?;

        Ok(Receipt {
            transaction_id: body.transaction_id,
            player: player.clone(),
            amount,
            currency: currency.to_string(),
            balance: body.balance,
        })
    }
}

fn transport_error(err: reqwest::Error) -> EconomyError {
    if err.is_timeout() {
        EconomyError::unavailable("request timed out")
    } else {
        EconomyError::unavailable(err.to_string())
    }
}

/// 404 means no account; 5xx and 429 are transient; anything else is a
/// rejection, carrying the service's `message` when the body has one.
fn status_error(player: &PlayerId, status: StatusCode, body: &str) -> EconomyError {
    if status == StatusCode::NOT_FOUND {
        return EconomyError::AccountNotFound {
            player: player.clone(),
        };
    }
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return EconomyError::unavailable(format!("HTTP {} from economy service", status));
    }

    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(body) => EconomyError::rejected(body.message),
        Err(_) => EconomyError::rejected(format!("HTTP {} from economy service", status)),
    }
}

#[derive(Debug, Serialize)]
struct DepositRequest<'a> {
    amount: f64,
    currency: &'a str,
    reason: &'a str,
}

#[derive(Debug, Deserialize)]
struct DepositResponse {
    transaction_id: String,
    #[serde(default)]
    balance: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn unreachable_service_reports_unavailable() {
        let config = HttpEconomyConfig {
            base_url: reqwest::Url::parse("http://127.0.0.1:1/").unwrap(),
            api_token: Some("secret".to_string()),
            timeout: Duration::from_millis(500),
        };
        let service = HttpEconomyService::new(config).expect("client builds");

        let error = service
            .deposit(&PlayerId::new("p1"), 5.0, "dollars", "miner")
            .expect_err("nothing listens on port 1");
        assert!(matches!(error, EconomyError::ServiceUnavailable { .. }));
        assert_eq!(service.provider_name(), "http");
    }

    #[test]
    fn error_statuses_map_to_economy_errors() {
        let player = PlayerId::new("p1");

        assert_eq!(
            status_error(&player, StatusCode::NOT_FOUND, ""),
            EconomyError::AccountNotFound {
                player: player.clone()
            }
        );
        assert!(matches!(
            status_error(&player, StatusCode::SERVICE_UNAVAILABLE, "down"),
            EconomyError::ServiceUnavailable { .. }
        ));
        assert!(matches!(
            status_error(&player, StatusCode::TOO_MANY_REQUESTS, ""),
            EconomyError::ServiceUnavailable { .. }
        ));
        assert_eq!(
            status_error(
                &player,
                StatusCode::BAD_REQUEST,
                r#"{"message":"currency not supported"}"#
            ),
            EconomyError::rejected("currency not supported")
        );
        assert_eq!(
            status_error(&player, StatusCode::FORBIDDEN, "<html>nope</html>"),
            EconomyError::rejected("HTTP 403 Forbidden from economy service")
        );
    }

    #[test]
    fn deposit_payload_serialises_as_json() {
        let payload = DepositRequest {
            amount: 5.0,
            currency: "dollars",
            reason: "miner",
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["amount"], 5.0);
        assert_eq!(json["currency"], "dollars");

        let body: DepositResponse =
            serde_json::from_str(r#"{"transaction_id":"TX-9"}"#).unwrap();
        assert_eq!(body.transaction_id, "TX-9");
        assert!(body.balance.is_none());
    }
}
