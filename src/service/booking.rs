use std::sync::Arc;

use log::{error, info, warn};
use uuid::Uuid;

use crate::{
    db::BookingStore,
    errors::AppError,
    models::{BookingRequest, BookingWithEvent},
};

use super::{
    auth::AuthContext,
    notification::{NotificationQueue, NotificationTask},
};

pub struct BookingService {
    bookings: Arc<dyn BookingStore>,
    queue: Arc<dyn NotificationQueue>,
}

impl BookingService {
    pub fn new(bookings: Arc<dyn BookingStore>, queue: Arc<dyn NotificationQueue>) -> Self {
        Self { bookings, queue }
    }

    /// Reserves `tickets_count` tickets for the caller and records the
    /// booking. The confirmation is queued after the commit; failing to
    /// queue it does not undo the booking.
    pub async fn book(
        &self,
        auth: &AuthContext,
        event_id: Uuid,
        tickets_count: i32,
    ) -> Result<BookingWithEvent, AppError> {
        if tickets_count <= 0 {
            return Err(AppError::Validation(
                "Tickets count must be positive".to_string(),
            ));
        }
        let receipt = self
            .bookings
            .book(BookingRequest {
                user_id: auth.user_id,
                event_id,
                tickets_count,
            })
            .await?;
        info!(
            "user {} booked {} tickets for event {} ({} left)",
            auth.user_id, tickets_count, event_id, receipt.event.available_tickets
        );

        match receipt.user_email {
            Some(email) => {
                let task =
                    NotificationTask::booking_confirmation(email, &receipt.event, tickets_count);
                if let Err(err) = self.queue.enqueue(task).await {
                    error!(
                        "booking {} committed but its confirmation was not queued: {}",
                        receipt.booking.id, err
                    );
                }
            }
            None => warn!(
                "booking {} has no user email, skipping confirmation",
                receipt.booking.id
            ),
        }

        Ok(BookingWithEvent {
            booking: receipt.booking,
            event: Some(receipt.event),
        })
    }

    pub async fn my_bookings(&self, auth: &AuthContext) -> Result<Vec<BookingWithEvent>, AppError> {
        self.bookings.list_bookings_for_user(auth.user_id).await
    }
}
