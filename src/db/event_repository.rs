use crate::db::Database;
use crate::models::event::{Event, Price};
use crate::query::{paginate, sort_events, EventFilter, EventPage, EventSort, PageRequest};
use bincode::{Decode, Encode};
use chrono::{DateTime, Utc};
use tracing::info;

const EVENTS_TREE: &str = "events";

#[derive(Debug, Encode, Decode)]
pub struct StoredEvent {
    pub id: String,
    pub image: String,
    pub title: String,
    pub date: i64, // Store as timestamp
    pub start_time: String,
    pub end_time: String,
    pub location: String,
    pub category: String,
    pub description: String,
    pub tags: Vec<String>,
    pub price_free: bool,
    pub price_regular: f64,
    pub price_vip: f64,
    pub hosted_by: String,
    pub created_at: i64,
}

impl From<Event> for StoredEvent {
    fn from(event: Event) -> Self {
        StoredEvent {
            id: event.id,
            image: event.image,
            title: event.title,
            date: event.date.timestamp(),
            start_time: event.start_time,
            end_time: event.end_time,
            location: event.location,
            category: event.category,
            description: event.description,
            tags: event.tags,
            price_free: event.price.free,
            price_regular: event.price.regular,
            price_vip: event.price.vip,
            hosted_by: event.hosted_by,
            created_at: event.created_at.timestamp(),
        }
    }
}

impl From<StoredEvent> for Event {
    fn from(stored: StoredEvent) -> Self {
        Event {
            id: stored.id,
            image: stored.image,
            title: stored.title,
            date: DateTime::from_timestamp(stored.date, 0).unwrap_or_else(Utc::now),
            start_time: stored.start_time,
            end_time: stored.end_time,
            location: stored.location,
            category: stored.category,
            description: stored.description,
            tags: stored.tags,
            price: Price {
                free: stored.price_free,
                regular: stored.price_regular,
                vip: stored.price_vip,
            },
            hosted_by: stored.hosted_by,
            created_at: DateTime::from_timestamp(stored.created_at, 0)
                .unwrap_or_else(Utc::now),
        }
    }
}

pub struct EventRepository {
    db: Database,
}

impl EventRepository {
    pub fn new(db: Database) -> Self {
        EventRepository { db }
    }

    pub async fn insert(&self, event: Event) -> Result<Event, String> {
        let events_tree = self
            .db
            .db
            .open_tree(EVENTS_TREE)
            .map_err(|e| format!("Failed to open events tree: {}", e))?;

        let stored_event = StoredEvent::from(event.clone());
        let encoded = bincode::encode_to_vec(&stored_event, bincode::config::standard())
            .map_err(|e| format!("Failed to encode event: {}", e))?;

        events_tree
            .insert(event.id.as_bytes(), encoded.as_slice())
            .map_err(|e| format!("Failed to insert event: {}", e))?;

        info!(event_id = %event.id, title = %event.title, "Event created in database");

        Ok(event)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Event>, String> {
        let events_tree = self
            .db
            .db
            .open_tree(EVENTS_TREE)
            .map_err(|e| format!("Failed to open events tree: {}", e))?;

        match events_tree
            .get(id.as_bytes())
            .map_err(|e| format!("Failed to get event: {}", e))?
        {
            Some(data) => {
                let (stored_event, _): (StoredEvent, usize) =
                    bincode::decode_from_slice(&data, bincode::config::standard())
                        .map_err(|e| format!("Failed to decode event: {}", e))?;
                Ok(Some(Event::from(stored_event)))
            }
            None => Ok(None),
        }
    }

    fn scan(&self) -> Result<Vec<Event>, String> {
        let events_tree = self
            .db
            .db
            .open_tree(EVENTS_TREE)
            .map_err(|e| format!("Failed to open events tree: {}", e))?;

        let mut events = Vec::new();
        for entry in events_tree.iter() {
            let (_, data) = entry.map_err(|e| format!("Failed to scan events: {}", e))?;
            let (stored_event, _): (StoredEvent, usize) =
                bincode::decode_from_slice(&data, bincode::config::standard())
                    .map_err(|e| format!("Failed to decode event: {}", e))?;
            events.push(Event::from(stored_event));
        }
        Ok(events)
    }

    /// Runs the compiled filter over the collection and returns one page
    /// plus the totals the list envelope reports.
    pub async fn search(
        &self,
        filter: &EventFilter,
        sort: EventSort,
        request: &PageRequest,
    ) -> Result<EventPage, String> {
        let mut matches: Vec<Event> = self
            .scan()?
            .into_iter()
            .filter(|event| filter.matches(event))
            .collect();
        sort_events(&mut matches, sort);
        Ok(paginate(matches, request))
    }

    /// Filtered, sorted, capped read for the fixed-size feeds and the
    /// similar-events lookup. Ignores pagination entirely.
    pub async fn find(
        &self,
        filter: &EventFilter,
        sort: EventSort,
        limit: usize,
    ) -> Result<Vec<Event>, String> {
        let mut matches: Vec<Event> = self
            .scan()?
            .into_iter()
            .filter(|event| filter.matches(event))
            .collect();
        sort_events(&mut matches, sort);
        matches.truncate(limit);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::start_of_today;
    use chrono::Duration;

    fn test_event(id: &str, days_from_now: i64, created_minutes_ago: i64) -> Event {
        Event {
            id: id.to_string(),
            image: "https://img.example/e.jpg".to_string(),
            title: format!("Event {}", id),
            date: Utc::now() + Duration::days(days_from_now),
            start_time: "10:00 AM".to_string(),
            end_time: "4:00 PM".to_string(),
            location: "Lagos".to_string(),
            category: "Tech".to_string(),
            description: "A gathering".to_string(),
            tags: vec!["tech".to_string()],
            price: Price::free(),
            hosted_by: "host-1".to_string(),
            created_at: Utc::now() - Duration::minutes(created_minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_event() {
        let db = Database::in_memory().unwrap();
        let repo = EventRepository::new(db);
        let event = test_event("e1", 1, 0);

        repo.insert(event.clone()).await.unwrap();

        let retrieved = repo.get_by_id("e1").await.unwrap().unwrap();
        assert_eq!(retrieved.title, event.title);
        assert_eq!(retrieved.price, event.price);
        assert_eq!(retrieved.date.timestamp(), event.date.timestamp());
    }

    #[tokio::test]
    async fn test_get_missing_event() {
        let db = Database::in_memory().unwrap();
        let repo = EventRepository::new(db);
        assert!(repo.get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_paginates_newest_first() {
        let db = Database::in_memory().unwrap();
        let repo = EventRepository::new(db);
        for i in 0..7 {
            repo.insert(test_event(&format!("e{}", i), 1, 60 - i))
                .await
                .unwrap();
        }

        let filter = EventFilter::new().starting_from(start_of_today());
        let request = PageRequest::from_param(Some("2"), 3);
        let page = repo
            .search(&filter, EventSort::CreatedDesc, &request)
            .await
            .unwrap();

        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_events, 7);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.events.len(), 3);
        // e6 is the newest; page 2 starts at the 4th newest.
        assert_eq!(page.events[0].id, "e3");
    }

    #[tokio::test]
    async fn test_search_excludes_past_events() {
        let db = Database::in_memory().unwrap();
        let repo = EventRepository::new(db);
        repo.insert(test_event("past", -2, 0)).await.unwrap();
        repo.insert(test_event("future", 2, 0)).await.unwrap();

        let filter = EventFilter::new().starting_from(start_of_today());
        let page = repo
            .search(&filter, EventSort::CreatedDesc, &PageRequest::from_param(None, 10))
            .await
            .unwrap();

        assert_eq!(page.total_events, 1);
        assert_eq!(page.events[0].id, "future");
    }

    #[tokio::test]
    async fn test_find_caps_and_sorts_by_date() {
        let db = Database::in_memory().unwrap();
        let repo = EventRepository::new(db);
        for i in 0..9 {
            repo.insert(test_event(&format!("e{}", i), 9 - i, 0))
                .await
                .unwrap();
        }

        let filter = EventFilter::new().starting_from(start_of_today());
        let feed = repo.find(&filter, EventSort::DateAsc, 6).await.unwrap();

        assert_eq!(feed.len(), 6);
        // e8 has the soonest date.
        assert_eq!(feed[0].id, "e8");
        assert!(feed.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[tokio::test]
    async fn test_search_by_host() {
        let db = Database::in_memory().unwrap();
        let repo = EventRepository::new(db);
        let mut mine = test_event("mine", 1, 0);
        mine.hosted_by = "host-2".to_string();
        repo.insert(mine).await.unwrap();
        repo.insert(test_event("other", 1, 0)).await.unwrap();

        let filter = EventFilter::new().hosted_by("host-2");
        let page = repo
            .search(&filter, EventSort::CreatedDesc, &PageRequest::from_param(None, 3))
            .await
            .unwrap();

        assert_eq!(page.total_events, 1);
        assert_eq!(page.events[0].id, "mine");
    }
}
