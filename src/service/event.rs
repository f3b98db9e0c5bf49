use std::sync::Arc;

use log::{error, info};
use uuid::Uuid;

use crate::{
    db::EventStore,
    dto::{NewEventDto, UpdateEventDto},
    errors::AppError,
    models::{Event, EventWithOrganizer, Role},
};

use super::{
    auth::AuthContext,
    notification::{NotificationQueue, NotificationTask},
};

pub struct EventService {
    events: Arc<dyn EventStore>,
    queue: Arc<dyn NotificationQueue>,
}

impl EventService {
    pub fn new(events: Arc<dyn EventStore>, queue: Arc<dyn NotificationQueue>) -> Self {
        Self { events, queue }
    }

    pub async fn create(&self, auth: &AuthContext, dto: NewEventDto) -> Result<Event, AppError> {
        auth.require_role(Role::Organizer)?;
        let event = self
            .events
            .create_event(dto.into_new_event(auth.user_id)?)
            .await?;
        info!(
            "organizer {} created event {} with {} tickets",
            auth.user_id, event.id, event.total_tickets
        );
        Ok(event)
    }

    pub async fn list(&self) -> Result<Vec<EventWithOrganizer>, AppError> {
        self.events.list_events().await
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<EventWithOrganizer, AppError> {
        self.events
            .find_event(id)
            .await?
            .ok_or_else(AppError::event_not_found)
    }

    /// Every successful update queues one event-update notification.
    pub async fn update(
        &self,
        auth: &AuthContext,
        id: Uuid,
        dto: UpdateEventDto,
    ) -> Result<Event, AppError> {
        auth.require_role(Role::Organizer)?;
        let changes = dto.into_changes()?;
        let event = self.events.update_event(id, auth.user_id, changes).await?;
        info!("organizer {} updated event {}", auth.user_id, event.id);
        self.notify(NotificationTask::event_update(&event)).await;
        Ok(event)
    }

    pub async fn delete(&self, auth: &AuthContext, id: Uuid) -> Result<(), AppError> {
        auth.require_role(Role::Organizer)?;
        let event = self.events.delete_event(id, auth.user_id).await?;
        info!("organizer {} deleted event {}", auth.user_id, event.id);
        self.notify(NotificationTask::event_cancellation(&event)).await;
        Ok(())
    }

    async fn notify(&self, task: NotificationTask) {
        let name = task.job_name();
        let event_id = task.event_id();
        if let Err(err) = self.queue.enqueue(task).await {
            error!("failed to queue {} for event {}: {}", name, event_id, err);
        }
    }
}
