use actix_web::{get, post, web, HttpResponse};

use crate::{
    dto::NewBookingDto,
    errors::AppError,
    service::{auth::AuthContext, booking::BookingService},
};

#[post("")]
pub async fn book(
    auth: AuthContext,
    dto: web::Json<NewBookingDto>,
    bookings: web::Data<BookingService>,
) -> Result<HttpResponse, AppError> {
    let (event_id, tickets_count) = dto.into_inner().validate()?;
    let booking = bookings.book(&auth, event_id, tickets_count).await?;
    Ok(HttpResponse::Created().json(booking))
}

#[get("/my-bookings")]
pub async fn my_bookings(
    auth: AuthContext,
    bookings: web::Data<BookingService>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(bookings.my_bookings(&auth).await?))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(book).service(my_bookings);
}
