//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use ledger_types::{
    AppError, DepositRequest, LedgerRepository, MovementResponse, PayrollRequest,
    TransferRequest, WithdrawRequest,
};

use crate::LedgerService;

/// Application state shared across handlers.
pub struct AppState<R: LedgerRepository> {
    pub service: LedgerService<R>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RateNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::LockTimeout => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.0.to_string(),
            "code": self.0.code(),
        });

        (status, Json(body)).into_response()
    }
}

/// `OK` is 200; business rejections are 422 with the outcome in the body.
fn movement_response(resp: MovementResponse) -> (StatusCode, Json<MovementResponse>) {
    let status = if resp.outcome.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    (status, Json(resp))
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Transfer money between accounts.
#[tracing::instrument(skip(state, req), fields(from = %req.from_account, to = %req.to_account, amount = %req.amount))]
pub async fn transfer<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<TransferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state.service.transfer(req).await?;
    Ok(movement_response(resp))
}

/// Run a payroll batch.
#[tracing::instrument(skip(state, req), fields(funding = %req.funding_account, items = req.items.len()))]
pub async fn payroll<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<PayrollRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.service.disburse(req).await?;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(report)))
}

/// Deposit money into an account.
#[tracing::instrument(skip(state, req), fields(account = %req.account, amount = %req.amount))]
pub async fn deposit<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<DepositRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state.service.deposit(req).await?;
    Ok(movement_response(resp))
}

/// Withdraw money from an account.
#[tracing::instrument(skip(state, req), fields(account = %req.account, amount = %req.amount))]
pub async fn withdraw<R: LedgerRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<WithdrawRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state.service.withdraw(req).await?;
    Ok(movement_response(resp))
}
