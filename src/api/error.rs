use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::lending::LendingError;

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを
/// 提供する。ボディに載るのは安定したエラーコードのみ。
#[derive(Debug)]
pub struct ApiError(LendingError);

impl From<LendingError> for ApiError {
    fn from(err: LendingError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            // 400 Bad Request - 入力の欠落・不正
            LendingError::MissingBodyKey(_)
            | LendingError::MissingFields
            | LendingError::MissingId
            | LendingError::InvalidQuery(_) => StatusCode::BAD_REQUEST,

            // 404 Not Found - 対象が存在しない
            LendingError::BorrowerNotFound
            | LendingError::BookNotFound
            | LendingError::LoanNotFound => StatusCode::NOT_FOUND,

            // 422 Unprocessable Entity - ビジネスルール違反
            LendingError::OutOfStock => StatusCode::UNPROCESSABLE_ENTITY,

            // 403 Forbidden - 権限ゲートの拒否
            LendingError::Unauthorized => StatusCode::FORBIDDEN,

            // 409 Conflict - 一時的な競合。クライアントは再試行してよい
            LendingError::WriteConflict => StatusCode::CONFLICT,

            // 500 Internal Server Error - システム障害
            // 詳細はログに記録し、クライアントにはコードのみを返す
            LendingError::ConsistencyViolation(detail) => {
                tracing::error!("inventory consistency violation: {}", detail);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            LendingError::Store(err) => {
                tracing::error!("store error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            LendingError::AuthGateFailure(err) => {
                tracing::error!("auth gate error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.0.code()));
        (status, body).into_response()
    }
}
