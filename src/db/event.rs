use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{prelude::FromRow, PgConnection};
use uuid::Uuid;

use crate::{
    errors::AppError,
    models::{Event, EventChanges, EventWithOrganizer, NewEvent, OrganizerSummary},
};

use super::{user_reference_error, EventStore, PgStore};

const SELECT_WITH_ORGANIZER: &str = "SELECT e.id, e.title, e.description, e.date, e.location,
    e.total_tickets, e.available_tickets, e.organizer_id, u.email AS organizer_email
    FROM events e
    JOIN users u ON u.id = e.organizer_id";

#[derive(FromRow)]
struct EventOrganizerRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    date: DateTime<Utc>,
    location: String,
    total_tickets: i32,
    available_tickets: i32,
    organizer_id: Uuid,
    organizer_email: String,
}

impl From<EventOrganizerRow> for EventWithOrganizer {
    fn from(row: EventOrganizerRow) -> Self {
        EventWithOrganizer {
            organizer: OrganizerSummary {
                id: row.organizer_id,
                email: row.organizer_email,
            },
            event: Event {
                id: row.id,
                title: row.title,
                description: row.description,
                date: row.date,
                location: row.location,
                total_tickets: row.total_tickets,
                available_tickets: row.available_tickets,
                organizer_id: row.organizer_id,
            },
        }
    }
}

/// Reads and row-locks an event owned by `organizer_id` for the rest of the transaction.
pub(super) async fn lock_owned_event(
    conn: &mut PgConnection,
    id: Uuid,
    organizer_id: Uuid,
) -> Result<Event, AppError> {
    let event = lock_event(conn, id).await?;
    event.check_owner(organizer_id)?;
    Ok(event)
}

pub(super) async fn lock_event(conn: &mut PgConnection, id: Uuid) -> Result<Event, AppError> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(AppError::event_not_found)
}

#[async_trait]
impl EventStore for PgStore {
    async fn create_event(&self, event: NewEvent) -> Result<Event, AppError> {
        let event = event.into_event(Uuid::new_v4());
        let created = sqlx::query_as::<_, Event>(
            "INSERT INTO events (id, title, description, date, location,
                total_tickets, available_tickets, organizer_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *",
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.location)
        .bind(event.total_tickets)
        .bind(event.available_tickets)
        .bind(event.organizer_id)
        .fetch_one(&self.pool)
        .await
        .map_err(user_reference_error)?;
        Ok(created)
    }

    async fn list_events(&self) -> Result<Vec<EventWithOrganizer>, AppError> {
        let rows = sqlx::query_as::<_, EventOrganizerRow>(&format!(
            "{SELECT_WITH_ORGANIZER} ORDER BY e.date, e.id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EventWithOrganizer::from).collect())
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<EventWithOrganizer>, AppError> {
        let row = sqlx::query_as::<_, EventOrganizerRow>(&format!(
            "{SELECT_WITH_ORGANIZER} WHERE e.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(EventWithOrganizer::from))
    }

    async fn update_event(
        &self,
        id: Uuid,
        organizer_id: Uuid,
        changes: EventChanges,
    ) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut event = lock_owned_event(&mut *tx, id, organizer_id).await?;
        event.apply_changes(changes)?;
        let updated = sqlx::query_as::<_, Event>(
            "UPDATE events
            SET title = $2, description = $3, date = $4, location = $5,
                total_tickets = $6, available_tickets = $7
            WHERE id = $1
            RETURNING *",
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.location)
        .bind(event.total_tickets)
        .bind(event.available_tickets)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_event(&self, id: Uuid, organizer_id: Uuid) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await?;
        let event = lock_owned_event(&mut *tx, id, organizer_id).await?;
        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(event)
    }
}
