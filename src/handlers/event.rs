use actix_web::{delete, get, post, put, web, HttpResponse};
use uuid::Uuid;

use crate::{
    dto::{NewEventDto, UpdateEventDto},
    errors::AppError,
    service::{auth::AuthContext, event::EventService},
};

#[post("")]
pub async fn create(
   auth: AuthContext,
   new_event_dto: web::Json<NewEventDto>,
   events: web::Data<EventService>,
) -> Result<HttpResponse, AppError> {
   let event = events.create(&auth, new_event_dto.into_inner()).await?;
   Ok(HttpResponse::Created().json(event))
}

#[get("")]
pub async fn get_all(events: web::Data<EventService>) -> Result<HttpResponse, AppError> {
   Ok(HttpResponse::Ok().json(events.list().await?))
}

#[get("/{id}")]
pub async fn get_by_id(
   id: web::Path<Uuid>,
   events: web::Data<EventService>,
) -> Result<HttpResponse, AppError> {
   Ok(HttpResponse::Ok().json(events.get_by_id(id.into_inner()).await?))
}

#[put("/{id}")]
pub async fn update(
   auth: AuthContext,
   id: web::Path<Uuid>,
   update_event_dto: web::Json<UpdateEventDto>,
   events: web::Data<EventService>,
) -> Result<HttpResponse, AppError> {
   let event = events
      .update(&auth, id.into_inner(), update_event_dto.into_inner())
      .await?;
   Ok(HttpResponse::Ok().json(event))
}

#[delete("/{id}")]
pub async fn remove(
   auth: AuthContext,
   id: web::Path<Uuid>,
   events: web::Data<EventService>,
) -> Result<HttpResponse, AppError> {
   events.delete(&auth, id.into_inner()).await?;
   Ok(HttpResponse::NoContent().finish())
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
   cfg.service(create)
      .service(get_all)
      .service(get_by_id)
      .service(update)
      .service(remove);
}
