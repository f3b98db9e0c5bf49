use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::{
    errors::AppError,
    models::{EventChanges, NewEvent, Role, User},
};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

pub struct Registration {
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl RegisterRequest {
    pub fn validate(self) -> Result<Registration, AppError> {
        let (Some(email), Some(password), Some(role)) = (
            non_blank(self.email),
            non_empty(self.password),
            non_blank(self.role),
        ) else {
            return Err(AppError::Validation(
                "Missing fields: email, password, role".to_string(),
            ));
        };
        let role = Role::parse(&role).ok_or_else(|| {
            let allowed: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
            AppError::Validation(format!("Invalid role. Must be one of: {}", allowed.join(", ")))
        })?;
        if !email.contains('@') {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }
        Ok(Registration { email, password, role })
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn validate(self) -> Result<(String, String), AppError> {
        match (non_blank(self.email), non_empty(self.password)) {
            (Some(email), Some(password)) => Ok((email, password)),
            _ => Err(AppError::Validation(
                "Missing fields: email, password".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewEventDto {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "event_date")]
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub total_tickets: Option<i32>,
}

impl NewEventDto {
    pub fn into_new_event(self, organizer_id: Uuid) -> Result<NewEvent, AppError> {
        let (Some(title), Some(date), Some(location), Some(total_tickets)) = (
            non_blank(self.title),
            self.date,
            non_blank(self.location),
            self.total_tickets,
        ) else {
            return Err(AppError::Validation("Missing required fields".to_string()));
        };
        check_total(total_tickets)?;
        Ok(NewEvent {
            title,
            description: self.description,
            date,
            location,
            total_tickets,
            organizer_id,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventDto {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "event_date")]
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub total_tickets: Option<i32>,
}

impl UpdateEventDto {
    pub fn into_changes(self) -> Result<EventChanges, AppError> {
        let title = provided_non_blank("title", self.title)?;
        let location = provided_non_blank("location", self.location)?;
        if let Some(total) = self.total_tickets {
            check_total(total)?;
        }
        Ok(EventChanges {
            title,
            description: self.description,
            date: self.date,
            location,
            total_tickets: self.total_tickets,
        })
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewBookingDto {
    pub event_id: Option<Uuid>,
    pub tickets_count: Option<i32>,
}

impl NewBookingDto {
    pub fn validate(self) -> Result<(Uuid, i32), AppError> {
        match (self.event_id, self.tickets_count) {
            (Some(event_id), Some(tickets_count)) => Ok((event_id, tickets_count)),
            _ => Err(AppError::Validation(
                "Missing fields: eventId, ticketsCount".to_string(),
            )),
        }
    }
}

/// RFC 3339, or a date/date-time without offset read as UTC.
pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Some(Utc.from_utc_datetime(&naive))
}

fn event_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_event_date(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{raw}'"))),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn provided_non_blank(field: &str, value: Option<String>) -> Result<Option<String>, AppError> {
    match value {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => {
            Err(AppError::Validation(format!("{field} must not be blank")))
        }
        Some(v) => Ok(Some(v.trim().to_string())),
    }
}

fn check_total(total: i32) -> Result<(), AppError> {
    if total < 1 {
        return Err(AppError::Validation(
            "totalTickets must be a positive number".to_string(),
        ));
    }
    Ok(())
}
