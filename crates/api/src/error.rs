use axum::{http::StatusCode, response::IntoResponse, Json};
use postq_core::error::EngineError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("channel {channel_id} is not registered to user {user_id}")]
    InvalidChannel { user_id: String, channel_id: String },
    #[error("scheduled time is not in the future")]
    PastTime,
    #[error("post set spans more than one channel")]
    MixedChannel,
    #[error("database error")]
    Db(#[from] sqlx::Error),
    #[error("unexpected error")]
    Internal(#[from] anyhow::Error),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidChannel { user_id, channel_id } => {
                ApiError::InvalidChannel { user_id, channel_id }
            }
            EngineError::PastTime(_) => ApiError::PastTime,
            EngineError::MixedChannel => ApiError::MixedChannel,
            EngineError::CountMismatch { .. } => ApiError::BadRequest(err.to_string()),
            EngineError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            EngineError::MissingMedia(_) => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::InvalidChannel { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_channel", self.to_string())
            }
            ApiError::PastTime => {
                (StatusCode::UNPROCESSABLE_ENTITY, "past_time", self.to_string())
            }
            ApiError::MixedChannel => {
                (StatusCode::UNPROCESSABLE_ENTITY, "mixed_channel", self.to_string())
            }
            ApiError::Db(err) => {
                error!(%err, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Unexpected error".to_string(),
                )
            }
            ApiError::Internal(err) => {
                error!(%err, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Unexpected error".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody {
                    code: code.to_string(),
                    message,
                },
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_bad_request_response() {
        rt().block_on(async {
            let err = ApiError::BadRequest("missing field".to_string());
            let response = err.into_response();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let body = to_bytes(response.into_body(), 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

            assert_eq!(json["error"]["code"], "invalid_request");
            assert_eq!(json["error"]["message"], "missing field");
        });
    }

    #[test]
    fn test_not_found_response() {
        rt().block_on(async {
            let err = ApiError::NotFound("post xyz not found".to_string());
            let response = err.into_response();

            assert_eq!(response.status(), StatusCode::NOT_FOUND);

            let body = to_bytes(response.into_body(), 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

            assert_eq!(json["error"]["code"], "not_found");
            assert_eq!(json["error"]["message"], "post xyz not found");
        });
    }

    #[test]
    fn test_invalid_channel_response() {
        rt().block_on(async {
            let err = ApiError::InvalidChannel {
                user_id: "u1".to_string(),
                channel_id: "ch_a".to_string(),
            };
            let response = err.into_response();

            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

            let body = to_bytes(response.into_body(), 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

            assert_eq!(json["error"]["code"], "invalid_channel");
        });
    }

    #[test]
    fn test_past_time_and_mixed_channel_codes() {
        rt().block_on(async {
            let response = ApiError::PastTime.into_response();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
            let body = to_bytes(response.into_body(), 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["error"]["code"], "past_time");

            let response = ApiError::MixedChannel.into_response();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
            let body = to_bytes(response.into_body(), 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(json["error"]["code"], "mixed_channel");
        });
    }

    #[test]
    fn test_engine_error_mapping() {
        let err: ApiError = EngineError::MixedChannel.into();
        assert!(matches!(err, ApiError::MixedChannel));

        let err: ApiError = EngineError::PastTime(chrono::Utc::now()).into();
        assert!(matches!(err, ApiError::PastTime));

        let err: ApiError = EngineError::InvalidChannel {
            user_id: "u1".to_string(),
            channel_id: "ch_a".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::InvalidChannel { .. }));

        let err: ApiError = EngineError::NotFound("post".to_string()).into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_internal_error_hides_details() {
        rt().block_on(async {
            let err = ApiError::Internal(anyhow::anyhow!("secret failure"));
            let response = err.into_response();

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

            let body = to_bytes(response.into_body(), 1024).await.unwrap();
            let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

            assert_eq!(json["error"]["code"], "internal_error");
            assert_eq!(json["error"]["message"], "Unexpected error");
        });
    }
}
