//! # Ledger Client SDK
//!
//! A typed Rust client for the Ledger API.
//!
//! Business rejections (`NO_MONEY`, `LIMIT_EXCEEDED`, a refused payroll
//! batch, ...) come back as `Ok` values carrying the outcome code; only
//! faults and transport failures are `Err`.

use ledger_types::{
    AccountNumber, CurrencyCode, Decimal, DepositRequest, MovementResponse, PayrollItem,
    PayrollReport, PayrollRequest, TransferRequest, WithdrawRequest,
};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} {code} - {message}")]
    Api {
        status: u16,
        /// Stable error code from the response body, `UNKNOWN` if absent
        code: String,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Ledger API client.
pub struct LedgerClient {
    base_url: String,
    http: Client,
}

impl LedgerClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Moves money between two accounts.
    pub async fn transfer(
        &self,
        from_account: AccountNumber,
        to_account: AccountNumber,
        amount: Decimal,
        currency: CurrencyCode,
        description: Option<String>,
    ) -> Result<MovementResponse, ClientError> {
        let req = TransferRequest {
            from_account,
            to_account,
            amount,
            currency,
            description,
        };
        self.post("/api/transfers", &req).await
    }

    /// Runs a payroll batch out of `funding_account`.
    pub async fn disburse(
        &self,
        funding_account: AccountNumber,
        items: Vec<PayrollItem>,
    ) -> Result<PayrollReport, ClientError> {
        let req = PayrollRequest {
            funding_account,
            items,
        };
        self.post("/api/payroll", &req).await
    }

    /// Deposits money into an account.
    pub async fn deposit(
        &self,
        account: AccountNumber,
        amount: Decimal,
        currency: CurrencyCode,
        description: Option<String>,
    ) -> Result<MovementResponse, ClientError> {
        let req = DepositRequest {
            account,
            amount,
            currency,
            description,
        };
        self.post("/api/deposits", &req).await
    }

    /// Withdraws money from an account.
    pub async fn withdraw(
        &self,
        account: AccountNumber,
        amount: Decimal,
        currency: CurrencyCode,
        description: Option<String>,
    ) -> Result<MovementResponse, ClientError> {
        let req = WithdrawRequest {
            account,
            amount,
            currency,
            description,
        };
        self.post("/api/withdrawals", &req).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        let body = resp.text().await?;
        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }

        // 422 is shared by business rejections and missing rates; only the
        // former deserializes as an outcome.
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            if let Ok(outcome) = serde_json::from_str(&body) {
                return Ok(outcome);
            }
        }

        Err(api_error(status, body))
    }
}

fn api_error(status: StatusCode, body: String) -> ClientError {
    let parsed = serde_json::from_str::<serde_json::Value>(&body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(|v| v.as_str())
            .map(String::from)
    };
    ClientError::Api {
        status: status.as_u16(),
        code: field("code").unwrap_or_else(|| "UNKNOWN".to_string()),
        message: field("error").unwrap_or(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LedgerClient::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_trailing_slash() {
        let client = LedgerClient::new("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_api_error_reads_code_and_message() {
        let err = api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"error":"Lock wait timed out","code":"LOCK_TIMEOUT"}"#.to_string(),
        );
        match err {
            ClientError::Api {
                status,
                code,
                message,
            } => {
                assert_eq!(status, 503);
                assert_eq!(code, "LOCK_TIMEOUT");
                assert_eq!(message, "Lock wait timed out");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_api_error_with_plain_body() {
        let err = api_error(StatusCode::BAD_GATEWAY, "upstream down".to_string());
        match err {
            ClientError::Api { code, message, .. } => {
                assert_eq!(code, "UNKNOWN");
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
