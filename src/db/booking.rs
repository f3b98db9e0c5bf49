use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    errors::AppError,
    models::{Booking, BookingReceipt, BookingRequest, BookingWithEvent, Event},
};

use super::{event::lock_event, user_reference_error, BookingStore, PgStore};

#[async_trait]
impl BookingStore for PgStore {
    async fn book(&self, request: BookingRequest) -> Result<BookingReceipt, AppError> {
        let mut tx = self.pool.begin().await?;

        // FOR UPDATE makes a concurrent booking of the same event wait here
        // and then see the decremented count.
        let mut event = lock_event(&mut *tx, request.event_id).await?;
        event.reserve(request.tickets_count)?;

        let event = sqlx::query_as::<_, Event>(
            "UPDATE events SET available_tickets = $2 WHERE id = $1 RETURNING *",
        )
        .bind(event.id)
        .bind(event.available_tickets)
        .fetch_one(&mut *tx)
        .await?;

        let booking = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (id, user_id, event_id, tickets_count, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(request.event_id)
        .bind(request.tickets_count)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(user_reference_error)?;

        let user_email: Option<String> =
            sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
                .bind(request.user_id)
                .fetch_optional(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(BookingReceipt {
            booking,
            event,
            user_email,
        })
    }

    async fn list_bookings_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<BookingWithEvent>, AppError> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE user_id = $1 ORDER BY created_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let event_ids: Vec<Uuid> = bookings.iter().map(|b| b.event_id).collect();
        let events: HashMap<Uuid, Event> =
            sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ANY($1)")
                .bind(&event_ids)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|event| (event.id, event))
                .collect();

        Ok(bookings
            .into_iter()
            .map(|booking| BookingWithEvent {
                event: events.get(&booking.event_id).cloned(),
                booking,
            })
            .collect())
    }
}
