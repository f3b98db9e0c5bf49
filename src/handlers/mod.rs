pub mod auth;
pub mod booking;
pub mod event;

use actix_web::{get, web, HttpResponse};

use crate::errors::AppError;

#[get("/")]
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().body("Event Booking API is running")
}

async fn not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound("Route not found".to_string()))
}

/// Mounts every route under `/api` and maps extractor failures to 400s.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        AppError::Validation(format!("Invalid path parameter: {}", err)).into()
    }))
    .service(index)
    .service(
        web::scope("/api")
            .service(web::scope("/auth").configure(auth::init_routes))
            .service(web::scope("/events").configure(event::init_routes))
            .service(web::scope("/bookings").configure(booking::init_routes)),
    )
    .default_service(web::to(not_found));
}
