use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use oliminate_core::CoreError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    Core(CoreError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::Core(err) => match err {
                CoreError::EmptyCart
                | CoreError::InsufficientStock { .. }
                | CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Unauthorized(_) => StatusCode::FORBIDDEN,
                CoreError::NotOpen { .. } | CoreError::Conflict(_) => StatusCode::CONFLICT,
                CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::AuthenticationError(msg) => json!({
                "error": "unauthenticated",
                "message": msg,
            }),
            AppError::Core(CoreError::Storage(detail)) => {
                tracing::error!("Internal Server Error: {}", detail);
                json!({
                    "error": "internal",
                    "message": "Internal Server Error",
                })
            }
            AppError::Core(CoreError::InsufficientStock { item, available }) => json!({
                "error": "insufficient_stock",
                "message": format!("Insufficient stock for {}. Only {} available.", item, available),
                "item": item,
                "available": available,
            }),
            AppError::Core(err) => json!({
                "error": err.kind(),
                "message": err.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::from(CoreError::EmptyCart).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::from(CoreError::NotOpen { status: "paid".to_string() }).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(CoreError::Unauthorized("x".to_string())).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::AuthenticationError("x".to_string()).status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
