pub mod booking;
pub mod event;
pub mod memory;
pub mod user;

use async_trait::async_trait;
use log::info;
use sqlx::postgres::{PgPoolOptions, Postgres};
use sqlx::Pool;
use uuid::Uuid;

use crate::{
    errors::AppError,
    models::{
        BookingReceipt, BookingRequest, BookingWithEvent, Event, EventChanges,
        EventWithOrganizer, NewEvent, NewUser, User,
    },
};

pub type PGPool = Pool<Postgres>;

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn create_event(&self, event: NewEvent) -> Result<Event, AppError>;

    async fn list_events(&self) -> Result<Vec<EventWithOrganizer>, AppError>;

    async fn find_event(&self, id: Uuid) -> Result<Option<EventWithOrganizer>, AppError>;

    /// Locks the event, checks existence and ownership, then applies `changes`.
    async fn update_event(
        &self,
        id: Uuid,
        organizer_id: Uuid,
        changes: EventChanges,
    ) -> Result<Event, AppError>;

    /// Same checks as `update_event`; returns the removed row.
    async fn delete_event(&self, id: Uuid, organizer_id: Uuid) -> Result<Event, AppError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Reads the event, re-checks availability, decrements it, records the
    /// booking and reads the booker's email, all in one transaction.
    async fn book(&self, request: BookingRequest) -> Result<BookingReceipt, AppError>;

    async fn list_bookings_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<BookingWithEvent>, AppError>;
}

/// PostgreSQL backend for every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PGPool,
}

impl PgStore {
    pub fn new(pool: PGPool) -> Self {
        Self { pool }
    }
}

/// Maps a foreign-key violation on a `users` reference to `unknown_user`.
fn user_reference_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_foreign_key_violation() {
            return AppError::unknown_user();
        }
    }
    AppError::from(err)
}

pub async fn init_db_pool(db_url: &str, max_connections: u32) -> Result<PGPool, AppError> {
    let pool: PGPool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await?;
    info!("connected to postgresql");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database migrations applied");
    Ok(pool)
}
