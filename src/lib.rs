pub mod config;
pub mod db;
pub mod dto;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod service;

use std::sync::Arc;

use actix_web::web;

use db::{BookingStore, EventStore, UserStore};
use service::{
    auth::{AuthService, TokenIssuer},
    booking::BookingService,
    event::EventService,
    notification::NotificationQueue,
};

/// The services one application instance runs on, shared by every worker.
#[derive(Clone)]
pub struct AppState {
    pub auth: web::Data<AuthService>,
    pub events: web::Data<EventService>,
    pub bookings: web::Data<BookingService>,
    pub tokens: web::Data<TokenIssuer>,
}

impl AppState {
    pub fn new<S>(store: S, queue: Arc<dyn NotificationQueue>, tokens: TokenIssuer) -> Self
    where
        S: UserStore + EventStore + BookingStore + 'static,
    {
        let store = Arc::new(store);
        let tokens = Arc::new(tokens);
        let users: Arc<dyn UserStore> = store.clone();
        let events: Arc<dyn EventStore> = store.clone();
        let bookings: Arc<dyn BookingStore> = store;
        Self {
            auth: web::Data::new(AuthService::new(users, tokens.clone())),
            events: web::Data::new(EventService::new(events, queue.clone())),
            bookings: web::Data::new(BookingService::new(bookings, queue)),
            tokens: web::Data::from(tokens),
        }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.auth.clone())
            .app_data(self.events.clone())
            .app_data(self.bookings.clone())
            .app_data(self.tokens.clone());
        handlers::config(cfg);
    }
}
