use actix_web::{post, web, HttpResponse};
use log::info;

use crate::{
    dto::{LoginRequest, RegisterRequest},
    errors::AppError,
    service::auth::AuthService,
};

#[post("/register")]
pub async fn register(
    dto: web::Json<RegisterRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let user = auth.register(dto.into_inner().validate()?).await?;
    Ok(HttpResponse::Created().json(user))
}

#[post("/login")]
pub async fn login(
    dto: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let (email, password) = dto.into_inner().validate()?;
    let response = auth.login(&email, &password).await?;
    info!("user {} logged in", response.user.id);
    Ok(HttpResponse::Ok().json(response))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(register).service(login);
}
