//! In-process store backing every store trait.
//!
//! One async mutex guards all tables, so each operation runs as a
//! serializable transaction: it works on copies and writes them back only
//! once every step has succeeded.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    errors::AppError,
    models::{
        Booking, BookingReceipt, BookingRequest, BookingWithEvent, Event, EventChanges,
        EventWithOrganizer, NewEvent, NewUser, OrganizerSummary, User,
    },
};

use super::{BookingStore, EventStore, UserStore};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    bookings: Vec<Booking>,
}

impl Tables {
    fn with_organizer(&self, event: &Event) -> Result<EventWithOrganizer, AppError> {
        let organizer = self.users.get(&event.organizer_id).ok_or_else(|| {
            log::error!("event {} references missing organizer {}", event.id, event.organizer_id);
            AppError::InternalError
        })?;
        Ok(EventWithOrganizer {
            event: event.clone(),
            organizer: OrganizerSummary {
                id: organizer.id,
                email: organizer.email.clone(),
            },
        })
    }

    fn owned_event(&self, id: Uuid, organizer_id: Uuid) -> Result<Event, AppError> {
        let event = self
            .events
            .get(&id)
            .cloned()
            .ok_or_else(AppError::event_not_found)?;
        event.check_owner(organizer_id)?;
        Ok(event)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create_event(&self, event: NewEvent) -> Result<Event, AppError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&event.organizer_id) {
            return Err(AppError::unknown_user());
        }
        let event = event.into_event(Uuid::new_v4());
        tables.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn list_events(&self) -> Result<Vec<EventWithOrganizer>, AppError> {
        let tables = self.tables.lock().await;
        let mut events: Vec<&Event> = tables.events.values().collect();
        events.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        events
            .into_iter()
            .map(|event| tables.with_organizer(event))
            .collect()
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<EventWithOrganizer>, AppError> {
        let tables = self.tables.lock().await;
        tables
            .events
            .get(&id)
            .map(|event| tables.with_organizer(event))
            .transpose()
    }

    async fn update_event(
        &self,
        id: Uuid,
        organizer_id: Uuid,
        changes: EventChanges,
    ) -> Result<Event, AppError> {
        let mut tables = self.tables.lock().await;
        let mut event = tables.owned_event(id, organizer_id)?;
        event.apply_changes(changes)?;
        tables.events.insert(id, event.clone());
        Ok(event)
    }

    async fn delete_event(&self, id: Uuid, organizer_id: Uuid) -> Result<Event, AppError> {
        let mut tables = self.tables.lock().await;
        let event = tables.owned_event(id, organizer_id)?;
        tables.events.remove(&id);
        Ok(event)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn book(&self, request: BookingRequest) -> Result<BookingReceipt, AppError> {
        let mut tables = self.tables.lock().await;
        let mut event = tables
            .events
            .get(&request.event_id)
            .cloned()
            .ok_or_else(AppError::event_not_found)?;
        event.reserve(request.tickets_count)?;
        let user_email = tables
            .users
            .get(&request.user_id)
            .map(|u| u.email.clone())
            .ok_or_else(AppError::unknown_user)?;
        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: request.user_id,
            event_id: request.event_id,
            tickets_count: request.tickets_count,
            created_at: Utc::now(),
        };

        tables.events.insert(event.id, event.clone());
        tables.bookings.push(booking.clone());
        Ok(BookingReceipt {
            booking,
            event,
            user_email: Some(user_email),
        })
    }

    async fn list_bookings_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<BookingWithEvent>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .map(|b| BookingWithEvent {
                booking: b.clone(),
                event: tables.events.get(&b.event_id).cloned(),
            })
            .collect())
    }
}
