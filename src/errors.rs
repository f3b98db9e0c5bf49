use actix_web::{
    error,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use derive_more::Display;
use log::error;
use serde::Serialize;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum AppError {
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "{}", _0)]
    Unauthenticated(String),

    /// Same shape for an unknown email and a wrong password.
    #[display(fmt = "Invalid credentials")]
    InvalidCredentials,

    #[display(fmt = "{}", _0)]
    Forbidden(String),

    #[display(fmt = "{}", _0)]
    NotFound(String),

    #[display(fmt = "{}", _0)]
    Conflict(String),

    #[display(fmt = "Not enough tickets available")]
    InsufficientInventory,

    #[display(fmt = "internal server error")]
    InternalError,
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn event_not_found() -> Self {
        AppError::NotFound("Event not found".to_string())
    }

    /// A valid token whose user is gone from the store.
    pub fn unknown_user() -> Self {
        AppError::Unauthenticated("User no longer exists".to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl error::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(ErrorBody {
                message: self.to_string(),
            })
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InsufficientInventory => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        error!("database error: {:?}", err);
        AppError::InternalError
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        error!("migration error: {:?}", err);
        AppError::InternalError
    }
}
