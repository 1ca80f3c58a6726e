use chrono::{DateTime, NaiveTime, Utc};
use std::collections::HashSet;

use crate::models::event::Event;

/// Start of the current UTC day. Events dated earlier than this are not
/// eligible for the public listing and feeds.
pub fn start_of_today() -> DateTime<Utc> {
    Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Immutable filter specification for event queries.
///
/// Each builder method contributes one independent predicate fragment; the
/// final value is the conjunction of every fragment that was set. Building
/// the filter is separate from running it, so a request handler can compose
/// fragments in any order and hand the finished value to the repository
/// exactly once.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    starting_from: Option<DateTime<Utc>>,
    ending_before: Option<DateTime<Utc>>,
    location_contains: Option<String>,
    category_contains: Option<String>,
    category_eq: Option<String>,
    search_term: Option<String>,
    any_tag: Option<Vec<String>>,
    free: Option<bool>,
    hosted_by: Option<String>,
    among: Option<HashSet<String>>,
    excluding: Option<String>,
}

impl EventFilter {
    pub fn new() -> Self {
        EventFilter::default()
    }

    /// Keep events dated at or after `cutoff`.
    pub fn starting_from(mut self, cutoff: DateTime<Utc>) -> Self {
        self.starting_from = Some(cutoff);
        self
    }

    /// Keep events dated strictly before `cutoff`.
    pub fn ending_before(mut self, cutoff: DateTime<Utc>) -> Self {
        self.ending_before = Some(cutoff);
        self
    }

    /// Case-insensitive substring match on the location field.
    pub fn location_contains(mut self, needle: &str) -> Self {
        self.location_contains = Some(needle.to_lowercase());
        self
    }

    /// Case-insensitive substring match on the category field.
    pub fn category_contains(mut self, needle: &str) -> Self {
        self.category_contains = Some(needle.to_lowercase());
        self
    }

    /// Whole-category match, used by the similar-events lookup.
    pub fn category_eq(mut self, category: &str) -> Self {
        self.category_eq = Some(category.to_string());
        self
    }

    /// Case-insensitive substring match across title, location and
    /// category, ORed together and ANDed with the rest of the filter.
    pub fn matching_term(mut self, term: &str) -> Self {
        self.search_term = Some(term.to_lowercase());
        self
    }

    /// Keep events whose tag list intersects `tags` (case-insensitive
    /// exact tag equality). An empty entry matches no event.
    pub fn with_any_tag(mut self, tags: Vec<String>) -> Self {
        self.any_tag = Some(tags);
        self
    }

    /// Keep only free (`true`) or only paid (`false`) events.
    pub fn free_only(mut self, free: bool) -> Self {
        self.free = Some(free);
        self
    }

    pub fn hosted_by(mut self, user_id: &str) -> Self {
        self.hosted_by = Some(user_id.to_string());
        self
    }

    /// Restrict the result to the given event ids.
    pub fn among(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.among = Some(ids.into_iter().collect());
        self
    }

    pub fn excluding(mut self, id: &str) -> Self {
        self.excluding = Some(id.to_string());
        self
    }

    pub fn matches(&self, event: &Event) -> bool {
        if let Some(cutoff) = self.starting_from {
            if event.date < cutoff {
                return false;
            }
        }
        if let Some(cutoff) = self.ending_before {
            if event.date >= cutoff {
                return false;
            }
        }
        if let Some(excluded) = &self.excluding {
            if event.id == *excluded {
                return false;
            }
        }
        if let Some(ids) = &self.among {
            if !ids.contains(&event.id) {
                return false;
            }
        }
        if let Some(host) = &self.hosted_by {
            if event.hosted_by != *host {
                return false;
            }
        }
        if let Some(needle) = &self.location_contains {
            if !event.location.to_lowercase().contains(needle) {
                return false;
            }
        }
        if let Some(needle) = &self.category_contains {
            if !event.category.to_lowercase().contains(needle) {
                return false;
            }
        }
        if let Some(category) = &self.category_eq {
            if !event.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(term) = &self.search_term {
            let hit = event.title.to_lowercase().contains(term)
                || event.location.to_lowercase().contains(term)
                || event.category.to_lowercase().contains(term);
            if !hit {
                return false;
            }
        }
        if let Some(wanted) = &self.any_tag {
            let hit = event
                .tags
                .iter()
                .any(|tag| wanted.iter().any(|w| tag.eq_ignore_ascii_case(w)));
            if !hit {
                return false;
            }
        }
        if let Some(free) = self.free {
            if event.price.free != free {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSort {
    /// Newest first; the deterministic order of the general listing.
    CreatedDesc,
    /// Soonest first; upcoming feeds.
    DateAsc,
    /// Most recent first; previous-events view.
    DateDesc,
}

/// Stable sort, so ties keep their storage order.
pub fn sort_events(events: &mut [Event], sort: EventSort) {
    match sort {
        EventSort::CreatedDesc => events.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        EventSort::DateAsc => events.sort_by(|a, b| a.date.cmp(&b.date)),
        EventSort::DateDesc => events.sort_by(|a, b| b.date.cmp(&a.date)),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl PageRequest {
    /// Builds a page request from the raw query value. Absent, non-numeric
    /// and non-positive values all fall back to page 1; pagination never
    /// rejects a request.
    pub fn from_param(raw: Option<&str>, per_page: usize) -> Self {
        let page = raw
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|page| *page >= 1)
            .unwrap_or(1) as usize;
        PageRequest { page, per_page }
    }

    fn skip(&self) -> usize {
        (self.page - 1) * self.per_page
    }
}

/// One page of matches plus the totals the list envelope reports.
#[derive(Debug, Clone)]
pub struct EventPage {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_events: usize,
    pub events: Vec<Event>,
}

/// Applies pagination math to an already filtered and sorted match set.
/// An empty match set yields zero pages and an empty slice.
pub fn paginate(matches: Vec<Event>, request: &PageRequest) -> EventPage {
    let total_events = matches.len();
    let total_pages = total_events.div_ceil(request.per_page);
    let events: Vec<Event> = matches
        .into_iter()
        .skip(request.skip())
        .take(request.per_page)
        .collect();
    EventPage {
        current_page: request.page,
        total_pages,
        total_events,
        events,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::Price;
    use chrono::Duration;

    fn event(id: &str, days_from_now: i64, created_minutes_ago: i64) -> Event {
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

    #[test]
    fn page_param_defaults_to_one() {
        assert_eq!(PageRequest::from_param(None, 10).page, 1);
        assert_eq!(PageRequest::from_param(Some(""), 10).page, 1);
        assert_eq!(PageRequest::from_param(Some("abc"), 10).page, 1);
        assert_eq!(PageRequest::from_param(Some("0"), 10).page, 1);
        assert_eq!(PageRequest::from_param(Some("-3"), 10).page, 1);
        assert_eq!(PageRequest::from_param(Some("2"), 10).page, 2);
        assert_eq!(PageRequest::from_param(Some(" 4 "), 10).page, 4);
    }

    #[test]
    fn paginates_25_matches_into_3_pages() {
        let mut matches: Vec<Event> = (0..25)
            .map(|i| event(&format!("{:02}", i), 1, 25 - i))
            .collect();
        // Newest created first: 24, 23, ... 00
        sort_events(&mut matches, EventSort::CreatedDesc);
        let page = paginate(matches, &PageRequest::from_param(Some("2"), 10));

        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_events, 25);
        assert_eq!(page.events.len(), 10);
        // Items 11-20 of the sorted order.
        assert_eq!(page.events.first().map(|e| e.id.as_str()), Some("14"));
        assert_eq!(page.events.last().map(|e| e.id.as_str()), Some("05"));
    }

    #[test]
    fn empty_match_set_has_zero_pages() {
        let page = paginate(Vec::new(), &PageRequest::from_param(None, 10));
        assert_eq!(page.current_page, 1);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.total_events, 0);
        assert!(page.events.is_empty());
    }

    #[test]
    fn page_past_the_end_is_empty_but_keeps_totals() {
        let matches: Vec<Event> = (0..4).map(|i| event(&i.to_string(), 1, i)).collect();
        let page = paginate(matches, &PageRequest::from_param(Some("3"), 3));
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.total_events, 4);
        assert!(page.events.is_empty());
    }

    #[test]
    fn temporal_filter_keeps_today_and_later() {
        let filter = EventFilter::new().starting_from(start_of_today());
        let mut today = event("today", 0, 0);
        today.date = start_of_today();
        assert!(filter.matches(&today));
        assert!(filter.matches(&event("tomorrow", 1, 0)));
        assert!(!filter.matches(&event("yesterday", -1, 0)));
    }

    #[test]
    fn ending_before_is_strict() {
        let now = Utc::now();
        let filter = EventFilter::new().ending_before(now);
        let mut boundary = event("b", 0, 0);
        boundary.date = now;
        assert!(!filter.matches(&boundary));
        assert!(filter.matches(&event("past", -2, 0)));
        assert!(!filter.matches(&event("future", 2, 0)));
    }

    #[test]
    fn location_and_category_match_substrings_case_insensitively() {
        let mut e = event("1", 1, 0);
        e.location = "Victoria Island, Lagos".to_string();
        e.category = "Live Music".to_string();

        assert!(EventFilter::new().location_contains("lagos").matches(&e));
        assert!(EventFilter::new().category_contains("MUSIC").matches(&e));
        assert!(!EventFilter::new().location_contains("abuja").matches(&e));
    }

    #[test]
    fn search_term_ors_across_title_location_and_category() {
        let mut e = event("1", 1, 0);
        e.title = "Rustconf".to_string();
        e.location = "online".to_string();
        e.category = "Tech".to_string();

        assert!(EventFilter::new().matching_term("rustconf").matches(&e));
        assert!(EventFilter::new().matching_term("ONLINE").matches(&e));
        assert!(EventFilter::new().matching_term("tech").matches(&e));
        assert!(!EventFilter::new().matching_term("cooking").matches(&e));
    }

    #[test]
    fn search_term_is_anded_with_other_fragments() {
        let mut e = event("1", 1, 0);
        e.title = "Jazz Night".to_string();
        e.category = "Music".to_string();

        let filter = EventFilter::new()
            .matching_term("jazz")
            .category_contains("tech");
        assert!(!filter.matches(&e));
    }

    #[test]
    fn tag_filter_intersects_case_insensitively() {
        let mut e = event("1", 1, 0);
        e.tags = vec!["Outdoors".to_string(), "family".to_string()];

        let hit = EventFilter::new()
            .with_any_tag(vec!["music".to_string(), "OUTDOORS".to_string()]);
        assert!(hit.matches(&e));

        let miss = EventFilter::new().with_any_tag(vec!["music".to_string()]);
        assert!(!miss.matches(&e));
    }

    #[test]
    fn empty_tag_entries_match_nothing() {
        let e = event("1", 1, 0);
        let filter = EventFilter::new().with_any_tag(vec![String::new(), String::new()]);
        assert!(!filter.matches(&e));
    }

    #[test]
    fn price_filter_splits_free_and_paid() {
        let free = event("free", 1, 0);
        let mut paid = event("paid", 1, 0);
        paid.price = Price::paid(1500.0, 5000.0);

        let free_only = EventFilter::new().free_only(true);
        assert!(free_only.matches(&free));
        assert!(!free_only.matches(&paid));

        let paid_only = EventFilter::new().free_only(false);
        assert!(!paid_only.matches(&free));
        assert!(paid_only.matches(&paid));
    }

    #[test]
    fn host_id_and_exclusion_filters() {
        let mut mine = event("mine", 1, 0);
        mine.hosted_by = "host-2".to_string();
        let other = event("other", 1, 0);

        let filter = EventFilter::new().hosted_by("host-2");
        assert!(filter.matches(&mine));
        assert!(!filter.matches(&other));

        let filter = EventFilter::new().excluding("mine");
        assert!(!filter.matches(&mine));
        assert!(filter.matches(&other));
    }

    #[test]
    fn among_restricts_to_the_id_set() {
        let a = event("a", 1, 0);
        let b = event("b", 1, 0);
        let filter = EventFilter::new().among(vec!["a".to_string()]);
        assert!(filter.matches(&a));
        assert!(!filter.matches(&b));
    }

    #[test]
    fn category_eq_ignores_case_but_not_substrings() {
        let mut e = event("1", 1, 0);
        e.category = "Music Festival".to_string();
        assert!(EventFilter::new().category_eq("music festival").matches(&e));
        assert!(!EventFilter::new().category_eq("Music").matches(&e));
    }

    #[test]
    fn sorts_by_creation_time_descending() {
        let mut events = vec![event("old", 1, 60), event("new", 1, 1), event("mid", 1, 30)];
        sort_events(&mut events, EventSort::CreatedDesc);
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn sorts_by_date_in_both_directions() {
        let mut events = vec![event("late", 9, 0), event("soon", 1, 0), event("mid", 5, 0)];
        sort_events(&mut events, EventSort::DateAsc);
        assert_eq!(events[0].id, "soon");
        assert_eq!(events[2].id, "late");

        sort_events(&mut events, EventSort::DateDesc);
        assert_eq!(events[0].id, "late");
        assert_eq!(events[2].id, "soon");
    }

    #[test]
    fn sort_is_stable_for_ties() {
        let created = Utc::now();
        let mut a = event("a", 1, 0);
        let mut b = event("b", 1, 0);
        a.created_at = created;
        b.created_at = created;
        let mut events = vec![a, b];
        sort_events(&mut events, EventSort::CreatedDesc);
        assert_eq!(events[0].id, "a");
        assert_eq!(events[1].id, "b");
    }

    #[test]
    fn fragments_combine_as_a_conjunction() {
        let mut e = event("1", 2, 0);
        e.location = "Lekki, Lagos".to_string();
        e.category = "Tech".to_string();
        e.tags = vec!["conference".to_string()];

        let filter = EventFilter::new()
            .starting_from(start_of_today())
            .location_contains("lagos")
            .category_contains("tech")
            .with_any_tag(vec!["conference".to_string()])
            .free_only(true);
        assert!(filter.matches(&e));

        // Flipping any single fragment breaks the conjunction.
        assert!(!filter.clone().free_only(false).matches(&e));
        assert!(!filter.location_contains("abuja").matches(&e));
    }
}
