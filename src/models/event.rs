use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Ticket pricing. Free events carry zeroed tiers; paid events must have
/// both tiers set to non-negative amounts.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, ToSchema)]
pub struct Price {
    pub free: bool,
    pub regular: f64,
    pub vip: f64,
}

impl Price {
    pub fn free() -> Self {
        Price {
            free: true,
            regular: 0.0,
            vip: 0.0,
        }
    }

    pub fn paid(regular: f64, vip: f64) -> Self {
        Price {
            free: false,
            regular,
            vip,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub image: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub start_time: String,
    pub end_time: String,
    /// Venue address, or the sentinel "online".
    pub location: String,
    pub category: String,
    pub description: String,
    pub tags: Vec<String>,
    pub price: Price,
    /// Id of the user hosting the event.
    pub hosted_by: String,
    pub created_at: DateTime<Utc>,
}

/// Host reference resolved for responses: full name only, never email or
/// credential fields.
#[derive(Debug, Serialize, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HostSummary {
    pub id: String,
    pub full_name: String,
}

/// An event as returned by the read endpoints.
#[derive(Debug, Serialize, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: String,
    pub image: String,
    pub title: String,
    pub date: DateTime<Utc>,
    pub start_time: String,
    pub end_time: String,
    pub location: String,
    pub category: String,
    pub description: String,
    pub tags: Vec<String>,
    pub price: Price,
    pub hosted_by: HostSummary,
    pub created_at: DateTime<Utc>,
}

impl EventView {
    pub fn from_event(event: Event, host_name: String) -> Self {
        EventView {
            id: event.id,
            image: event.image,
            title: event.title,
            date: event.date,
            start_time: event.start_time,
            end_time: event.end_time,
            location: event.location,
            category: event.category,
            description: event.description,
            tags: event.tags,
            price: event.price,
            hosted_by: HostSummary {
                id: event.hosted_by,
                full_name: host_name,
            },
            created_at: event.created_at,
        }
    }
}
