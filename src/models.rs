use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Organizer,
    Customer,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Organizer, Role::Customer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Organizer => "ORGANIZER",
            Role::Customer => "CUSTOMER",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.as_str() == value)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub location: String,
    pub total_tickets: i32,
    pub available_tickets: i32,
    pub organizer_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizerSummary {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventWithOrganizer {
    #[serde(flatten)]
    pub event: Event,
    pub organizer: OrganizerSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub tickets_count: i32,
    pub created_at: DateTime<Utc>,
}

/// A booking with the event as it is now, `None` once the event is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingWithEvent {
    #[serde(flatten)]
    pub booking: Booking,
    pub event: Option<Event>,
}

/// Everything the booking transaction produced, plus what the confirmation needs.
#[derive(Debug, Clone)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub event: Event,
    pub user_email: Option<String>,
}

pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub location: String,
    pub total_tickets: i32,
    pub organizer_id: Uuid,
}

impl NewEvent {
    pub fn into_event(self, id: Uuid) -> Event {
        Event {
            id,
            title: self.title,
            description: self.description,
            date: self.date,
            location: self.location,
            total_tickets: self.total_tickets,
            available_tickets: self.total_tickets,
            organizer_id: self.organizer_id,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub total_tickets: Option<i32>,
}

#[derive(Debug, Clone, Copy)]
pub struct BookingRequest {
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub tickets_count: i32,
}

impl Event {
    pub fn booked_tickets(&self) -> i32 {
        self.total_tickets - self.available_tickets
    }

    pub fn check_owner(&self, organizer_id: Uuid) -> Result<(), AppError> {
        if self.organizer_id == organizer_id {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Only the organizer of this event may change it".to_string(),
            ))
        }
    }

    /// Applies a partial update. A new total keeps the already-booked
    /// tickets booked and is rejected when it would fall below them.
    pub fn apply_changes(&mut self, changes: EventChanges) -> Result<(), AppError> {
        if let Some(total) = changes.total_tickets {
            let booked = self.booked_tickets();
            if total < booked {
                return Err(AppError::Validation(format!(
                    "totalTickets cannot be lower than the {} tickets already booked",
                    booked
                )));
            }
            self.total_tickets = total;
            self.available_tickets = total - booked;
        }
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.description = Some(description);
        }
        if let Some(date) = changes.date {
            self.date = date;
        }
        if let Some(location) = changes.location {
            self.location = location;
        }
        Ok(())
    }

    /// Takes `count` tickets out of inventory.
    pub fn reserve(&mut self, count: i32) -> Result<(), AppError> {
        if self.available_tickets < count {
            return Err(AppError::InsufficientInventory);
        }
        self.available_tickets -= count;
        Ok(())
    }
}
