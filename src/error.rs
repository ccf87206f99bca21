use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Auth error: {0}")]
    AuthError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("This promotion has ended")]
    Expired,

    #[error("This promotion has not started yet")]
    NotStarted,

    /// 存储层/事务失败，调用方可用同样的 claim 请求幂等重试
    #[error("Claim arbitration failed: {0}")]
    ArbitrationFailure(String),

    #[error("External API error: {0}")]
    ExternalApiError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl AppError {
    /// 错误码，与响应体中的 error.code 一致
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) | AppError::JwtError(_) => "AUTH_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::PermissionDenied => "FORBIDDEN",
            AppError::Expired => "PROMOTION_EXPIRED",
            AppError::NotStarted => "PROMOTION_NOT_STARTED",
            AppError::ArbitrationFailure(_) => "ARBITRATION_FAILURE",
            AppError::ExternalApiError(_) | AppError::ReqwestError(_) => "EXTERNAL_API_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    /// 从服务端错误响应还原错误类型（客户端使用）
    pub fn from_api(code: &str, message: String) -> Self {
        match code {
            "VALIDATION_ERROR" => AppError::ValidationError(message),
            "AUTH_ERROR" => AppError::AuthError(message),
            "NOT_FOUND" => AppError::NotFound(message),
            "FORBIDDEN" => AppError::PermissionDenied,
            "PROMOTION_EXPIRED" => AppError::Expired,
            "PROMOTION_NOT_STARTED" => AppError::NotStarted,
            "ARBITRATION_FAILURE" | "DATABASE_ERROR" => AppError::ArbitrationFailure(message),
            _ => AppError::ExternalApiError(format!("{code}: {message}")),
        }
    }

    /// 结果未知、可用同一请求重试的错误
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::ArbitrationFailure(_) | AppError::DatabaseError(_) => true,
            AppError::ReqwestError(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            AppError::ExternalApiError(_) => true,
            _ => false,
        }
    }

    /// 请求可能已到达服务端、但结果未知
    ///
    /// 用于非幂等风险已由服务端消除的写请求（领取）：除构造请求失败外，
    /// 任何传输层错误都按结果未知处理，包括响应体读取 / 解码中途失败。
    pub fn is_unknown_outcome(&self) -> bool {
        match self {
            AppError::ReqwestError(e) => !e.is_builder(),
            _ => self.is_retryable(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) | AppError::JwtError(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PermissionDenied => StatusCode::FORBIDDEN,
            AppError::Expired => StatusCode::GONE,
            AppError::NotStarted => StatusCode::CONFLICT,
            AppError::ArbitrationFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ExternalApiError(_) | AppError::ReqwestError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                msg.clone()
            }
            AppError::AuthError(msg) => {
                log::warn!("Authentication error: {msg}");
                msg.clone()
            }
            AppError::JwtError(err) => {
                log::warn!("Authentication error: {err}");
                "Invalid access token".to_string()
            }
            AppError::NotFound(msg) => msg.clone(),
            AppError::PermissionDenied => {
                log::warn!("Permission denied");
                "Permission denied".to_string()
            }
            AppError::Expired | AppError::NotStarted => self.to_string(),
            AppError::ArbitrationFailure(msg) => {
                log::error!("Claim arbitration failure: {msg}");
                "Claim could not be processed, please retry".to_string()
            }
            AppError::ExternalApiError(msg) => {
                log::error!("External API error: {msg}");
                msg.clone()
            }
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                "Database error".to_string()
            }
            _ => {
                log::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
        };

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message
            }
        }))
    }
}
