use crate::db::event_repository::EventRepository;
use crate::db::user_repository::UserRepository;
use crate::media::MediaClient;
use crate::models::event::{Event, EventView, Price};
use crate::models::user::Claims;
use crate::query::{start_of_today, EventFilter, EventPage, EventSort, PageRequest};
use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};

const LISTING_PAGE_SIZE: usize = 10;
const USER_PAGE_SIZE: usize = 3;
const FEED_LIMIT: usize = 6;
const SIMILAR_LIMIT: usize = 3;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct EventListQuery {
    /// 1-based page number; anything unparsable falls back to 1.
    pub page: Option<String>,
    /// Case-insensitive location substring.
    pub location: Option<String>,
    /// Case-insensitive category substring.
    pub category: Option<String>,
    /// Comma-separated tag list; an event matches when any tag intersects.
    pub tag: Option<String>,
    /// "free" keeps free events; any other value keeps paid events.
    pub price: Option<String>,
    /// Substring searched across title, location and category.
    pub search_term: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number; anything unparsable falls back to 1.
    pub page: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventListResponse {
    pub success: bool,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_events: usize,
    pub num_of_events: usize,
    pub events: Vec<EventView>,
}

#[derive(Serialize, ToSchema)]
pub struct EventFeedResponse {
    pub success: bool,
    pub events: Vec<EventView>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SingleEventResponse {
    pub success: bool,
    pub event: EventView,
    pub similar_events: Vec<EventView>,
}

#[derive(Serialize, ToSchema)]
pub struct CreateEventResponse {
    pub success: bool,
    pub message: String,
    pub event: EventView,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PayEventResponse {
    pub success: bool,
    pub message: String,
    pub your_events: Vec<String>,
}

/// Multipart payload for event creation. Everything is optional at the
/// extraction layer so validation can answer with the envelope instead of
/// the extractor's default error.
#[derive(Debug, MultipartForm)]
pub struct CreateEventForm {
    pub title: Option<Text<String>>,
    pub date: Option<Text<String>>,
    #[multipart(rename = "startTime")]
    pub start_time: Option<Text<String>>,
    #[multipart(rename = "endTime")]
    pub end_time: Option<Text<String>>,
    pub location: Option<Text<String>>,
    /// "true" turns the event into an online one regardless of location.
    pub online: Option<Text<String>>,
    pub description: Option<Text<String>>,
    pub category: Option<Text<String>>,
    /// Comma separated list of tags.
    pub tags: Option<Text<String>>,
    /// "true" or "false"; paid events also need both price fields.
    pub free: Option<Text<String>>,
    #[multipart(rename = "regularPrice")]
    pub regular_price: Option<Text<f64>>,
    #[multipart(rename = "vipPrice")]
    pub vip_price: Option<Text<f64>>,
    #[multipart(limit = "10MB")]
    pub image: Option<TempFile>,
}

fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    raw.parse::<NaiveDate>()
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Resolves each event's host reference to the host's full name. Missing
/// hosts resolve to an empty name rather than failing the whole page.
async fn resolve_hosts(
    events: Vec<Event>,
    users: &UserRepository,
) -> Result<Vec<EventView>, String> {
    let mut names: HashMap<String, String> = HashMap::new();
    let mut views = Vec::with_capacity(events.len());
    for event in events {
        let name = match names.get(&event.hosted_by) {
            Some(name) => name.clone(),
            None => {
                let name = users
                    .get_by_id(&event.hosted_by)
                    .await?
                    .map(|user| user.full_name)
                    .unwrap_or_default();
                names.insert(event.hosted_by.clone(), name.clone());
                name
            }
        };
        views.push(EventView::from_event(event, name));
    }
    Ok(views)
}

/// Resolves hosts for one page of results and wraps it in the list
/// envelope.
async fn page_response(page: EventPage, users: &UserRepository) -> HttpResponse {
    let EventPage {
        current_page,
        total_pages,
        total_events,
        events,
    } = page;

    match resolve_hosts(events, users).await {
        Ok(views) => HttpResponse::Ok().json(EventListResponse {
            success: true,
            current_page,
            total_pages,
            total_events,
            num_of_events: views.len(),
            events: views,
        }),
        Err(e) => {
            error!(error = %e, "Failed to resolve event hosts");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }))
        }
    }
}

/// Filtered, paginated listing of upcoming events
#[utoipa::path(
    get,
    path = "/api/v1/events",
    params(EventListQuery),
    responses(
        (status = 200, description = "One page of matching events", body = EventListResponse)
    ),
    tag = "Events"
)]
pub async fn get_all_events(
    events: web::Data<EventRepository>,
    users: web::Data<UserRepository>,
    query: web::Query<EventListQuery>,
) -> impl Responder {
    let mut filter = EventFilter::new().starting_from(start_of_today());

    if let Some(term) = query.search_term.as_deref().filter(|v| !v.is_empty()) {
        filter = filter.matching_term(term);
    }
    if let Some(location) = query.location.as_deref().filter(|v| !v.is_empty()) {
        filter = filter.location_contains(location);
    }
    if let Some(category) = query.category.as_deref().filter(|v| !v.is_empty()) {
        filter = filter.category_contains(category);
    }
    if let Some(tag) = query.tag.as_deref().filter(|v| !v.is_empty()) {
        filter = filter.with_any_tag(split_tags(tag));
    }
    if let Some(price) = query.price.as_deref().filter(|v| !v.is_empty()) {
        filter = filter.free_only(price == "free");
    }

    let request = PageRequest::from_param(query.page.as_deref(), LISTING_PAGE_SIZE);
    match events
        .search(&filter, EventSort::CreatedDesc, &request)
        .await
    {
        Ok(page) => page_response(page, &users).await,
        Err(e) => {
            error!(error = %e, "Failed to query events");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }))
        }
    }
}

/// Next six upcoming events, soonest first
#[utoipa::path(
    get,
    path = "/api/v1/events/upcoming",
    responses(
        (status = 200, description = "Up to six upcoming events", body = EventFeedResponse)
    ),
    tag = "Events"
)]
pub async fn get_upcoming_events(
    events: web::Data<EventRepository>,
    users: web::Data<UserRepository>,
) -> impl Responder {
    let filter = EventFilter::new().starting_from(start_of_today());
    feed(&events, &users, filter).await
}

/// Next six free upcoming events, soonest first
#[utoipa::path(
    get,
    path = "/api/v1/events/free",
    responses(
        (status = 200, description = "Up to six free upcoming events", body = EventFeedResponse)
    ),
    tag = "Events"
)]
pub async fn get_free_events(
    events: web::Data<EventRepository>,
    users: web::Data<UserRepository>,
) -> impl Responder {
    let filter = EventFilter::new()
        .starting_from(start_of_today())
        .free_only(true);
    feed(&events, &users, filter).await
}

async fn feed(
    events: &EventRepository,
    users: &UserRepository,
    filter: EventFilter,
) -> HttpResponse {
    let found = match events.find(&filter, EventSort::DateAsc, FEED_LIMIT).await {
        Ok(found) => found,
        Err(e) => {
            error!(error = %e, "Failed to query event feed");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    match resolve_hosts(found, users).await {
        Ok(views) => HttpResponse::Ok().json(EventFeedResponse {
            success: true,
            events: views,
        }),
        Err(e) => {
            error!(error = %e, "Failed to resolve event hosts");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }))
        }
    }
}

/// Single event plus up to three same-category upcoming events
#[utoipa::path(
    get,
    path = "/api/v1/events/{event_id}",
    params(
        ("event_id" = String, Path, description = "Event id")
    ),
    responses(
        (status = 200, description = "Event with similar events", body = SingleEventResponse),
        (status = 404, description = "Event not found")
    ),
    tag = "Events"
)]
pub async fn get_single_event(
    events: web::Data<EventRepository>,
    users: web::Data<UserRepository>,
    path: web::Path<String>,
) -> impl Responder {
    let event_id = path.into_inner();

    let event = match events.get_by_id(&event_id).await {
        Ok(Some(event)) => event,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "success": false,
                "message": "Event not found"
            }));
        }
        Err(e) => {
            error!(error = %e, event_id = %event_id, "Failed to fetch event");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    let similar_filter = EventFilter::new()
        .starting_from(start_of_today())
        .category_eq(&event.category)
        .excluding(&event.id);
    let similar = match events
        .find(&similar_filter, EventSort::CreatedDesc, SIMILAR_LIMIT)
        .await
    {
        Ok(similar) => similar,
        Err(e) => {
            error!(error = %e, event_id = %event_id, "Failed to fetch similar events");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    let similar_events = match resolve_hosts(similar, &users).await {
        Ok(views) => views,
        Err(e) => {
            error!(error = %e, "Failed to resolve event hosts");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    let host_name = match users.get_by_id(&event.hosted_by).await {
        Ok(host) => host.map(|user| user.full_name).unwrap_or_default(),
        Err(e) => {
            error!(error = %e, "Failed to resolve event host");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    HttpResponse::Ok().json(SingleEventResponse {
        success: true,
        event: EventView::from_event(event, host_name),
        similar_events,
    })
}

/// Create an event from a multipart form (protected)
#[utoipa::path(
    post,
    path = "/api/v1/events",
    responses(
        (status = 201, description = "Event created successfully", body = CreateEventResponse),
        (status = 400, description = "Missing or invalid fields"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Events"
)]
pub async fn create_event(
    claims: web::ReqData<Claims>,
    events: web::Data<EventRepository>,
    users: web::Data<UserRepository>,
    media: web::Data<MediaClient>,
    form: MultipartForm<CreateEventForm>,
) -> impl Responder {
    let form = form.into_inner();

    let online = form
        .online
        .as_ref()
        .map(|flag| flag.as_str() == "true")
        .unwrap_or(false);

    let (title, date_raw, start_time, end_time, description, category, tags_raw, free_raw) = match (
        form.title,
        form.date,
        form.start_time,
        form.end_time,
        form.description,
        form.category,
        form.tags,
        form.free,
    ) {
        (
            Some(title),
            Some(date),
            Some(start_time),
            Some(end_time),
            Some(description),
            Some(category),
            Some(tags),
            Some(free),
        ) => (
            title.into_inner(),
            date.into_inner(),
            start_time.into_inner(),
            end_time.into_inner(),
            description.into_inner(),
            category.into_inner(),
            tags.into_inner(),
            free.into_inner(),
        ),
        _ => {
            warn!(user_id = %claims.sub, "Event creation failed: missing fields");
            return HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "message": "All fields are required"
            }));
        }
    };

    let location = match (online, form.location) {
        (true, _) => "online".to_string(),
        (false, Some(location)) if !location.trim().is_empty() => location.into_inner(),
        _ => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "message": "Location must be 'online' or a valid non-empty address"
            }));
        }
    };

    let image = match form.image {
        Some(image) => image,
        None => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "message": "All fields are required"
            }));
        }
    };

    if title.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": "Title is required"
        }));
    }

    let date = match parse_event_date(&date_raw) {
        Some(date) => date,
        None => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "message": "Invalid event date"
            }));
        }
    };

    let tags = split_tags(&tags_raw);
    if tags.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": "At least one tag is required"
        }));
    }

    let price = if free_raw == "true" {
        Price::free()
    } else {
        match (form.regular_price, form.vip_price) {
            (Some(regular), Some(vip)) if *regular >= 0.0 && *vip >= 0.0 => {
                Price::paid(*regular, *vip)
            }
            _ => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "success": false,
                    "message": "Regular and VIP prices are required for paid events"
                }));
            }
        }
    };

    let file_name = image
        .file_name
        .clone()
        .unwrap_or_else(|| "upload".to_string());
    // Read the temp file on the blocking pool, not the worker executor.
    let image_path = image.file.path().to_path_buf();
    let bytes = match web::block(move || std::fs::read(image_path)).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            error!(error = %e, "Failed to read uploaded image");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
        Err(e) => {
            error!(error = %e, "Failed to read uploaded image");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    let image_url = match media.upload_image(bytes, &file_name).await {
        Ok(url) => url,
        Err(e) => {
            error!(error = %e, user_id = %claims.sub, "Image upload failed");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Failed to upload image"
            }));
        }
    };

    let event = Event {
        id: uuid::Uuid::new_v4().to_string(),
        image: image_url,
        title,
        date,
        start_time,
        end_time,
        location,
        category,
        description,
        tags,
        price,
        hosted_by: claims.sub.clone(),
        created_at: Utc::now(),
    };

    let event = match events.insert(event).await {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "Failed to save event");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Failed to create event"
            }));
        }
    };

    let host_name = match users.get_by_id(&claims.sub).await {
        Ok(host) => host.map(|user| user.full_name).unwrap_or_default(),
        Err(e) => {
            error!(error = %e, "Failed to resolve event host");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    info!(
        user_id = %claims.sub,
        event_id = %event.id,
        title = %event.title,
        "User created new event"
    );

    HttpResponse::Created().json(CreateEventResponse {
        success: true,
        message: "Event created successfully".to_string(),
        event: EventView::from_event(event, host_name),
    })
}

/// Events hosted by the caller, paginated (protected)
#[utoipa::path(
    get,
    path = "/api/v1/events/hosted",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of hosted events", body = EventListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Events"
)]
pub async fn get_hosted_events(
    claims: web::ReqData<Claims>,
    events: web::Data<EventRepository>,
    users: web::Data<UserRepository>,
    query: web::Query<PageQuery>,
) -> impl Responder {
    let filter = EventFilter::new().hosted_by(&claims.sub);
    let request = PageRequest::from_param(query.page.as_deref(), USER_PAGE_SIZE);

    match events
        .search(&filter, EventSort::CreatedDesc, &request)
        .await
    {
        Ok(page) => page_response(page, &users).await,
        Err(e) => {
            error!(error = %e, "Failed to query hosted events");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }))
        }
    }
}

/// Add an event to the caller's paid events (protected)
#[utoipa::path(
    post,
    path = "/api/v1/events/pay/{event_id}",
    params(
        ("event_id" = String, Path, description = "Event id")
    ),
    responses(
        (status = 200, description = "Event added", body = PayEventResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Event or user not found"),
        (status = 409, description = "Event already added")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Events"
)]
pub async fn pay_for_event(
    claims: web::ReqData<Claims>,
    events: web::Data<EventRepository>,
    users: web::Data<UserRepository>,
    path: web::Path<String>,
) -> impl Responder {
    let event_id = path.into_inner();

    match events.get_by_id(&event_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "success": false,
                "message": "Event not found"
            }));
        }
        Err(e) => {
            error!(error = %e, event_id = %event_id, "Failed to fetch event");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    }

    match users.get_by_id(&claims.sub).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "success": false,
                "message": "User not found"
            }));
        }
        Err(e) => {
            error!(error = %e, "Failed to fetch user");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    }

    match users.add_attending(&claims.sub, &event_id).await {
        Ok(true) => {}
        Ok(false) => {
            return HttpResponse::Conflict().json(serde_json::json!({
                "success": false,
                "message": "Event already added to your events"
            }));
        }
        Err(e) => {
            error!(error = %e, "Failed to record attendance");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong while adding the event"
            }));
        }
    }

    let your_events = match users.attending_ids(&claims.sub).await {
        Ok(ids) => ids,
        Err(e) => {
            error!(error = %e, "Failed to list attendance");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    info!(user_id = %claims.sub, event_id = %event_id, "Event added to user's events");

    HttpResponse::Ok().json(PayEventResponse {
        success: true,
        message: "Event added to your events successfully".to_string(),
        your_events,
    })
}

/// The caller's attended events that are already over (protected)
#[utoipa::path(
    get,
    path = "/api/v1/events/previous",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of past events", body = EventListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Events"
)]
pub async fn get_previous_events(
    claims: web::ReqData<Claims>,
    events: web::Data<EventRepository>,
    users: web::Data<UserRepository>,
    query: web::Query<PageQuery>,
) -> impl Responder {
    attended_events(
        &claims,
        &events,
        &users,
        query.page.as_deref(),
        AttendedWindow::Previous,
    )
    .await
}

/// The caller's attended events still to come (protected)
#[utoipa::path(
    get,
    path = "/api/v1/events/attending",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of upcoming attended events", body = EventListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Events"
)]
pub async fn get_events_to_attend(
    claims: web::ReqData<Claims>,
    events: web::Data<EventRepository>,
    users: web::Data<UserRepository>,
    query: web::Query<PageQuery>,
) -> impl Responder {
    attended_events(
        &claims,
        &events,
        &users,
        query.page.as_deref(),
        AttendedWindow::Upcoming,
    )
    .await
}

enum AttendedWindow {
    /// Strictly before now, most recent first.
    Previous,
    /// Now or later, soonest first.
    Upcoming,
}

async fn attended_events(
    claims: &Claims,
    events: &EventRepository,
    users: &UserRepository,
    page_param: Option<&str>,
    window: AttendedWindow,
) -> HttpResponse {
    match users.get_by_id(&claims.sub).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "success": false,
                "message": "User not found"
            }));
        }
        Err(e) => {
            error!(error = %e, "Failed to fetch user");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    }

    let ids = match users.attending_ids(&claims.sub).await {
        Ok(ids) => ids,
        Err(e) => {
            error!(error = %e, "Failed to list attendance");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    let now = Utc::now();
    let (filter, sort) = match window {
        AttendedWindow::Previous => (
            EventFilter::new().among(ids).ending_before(now),
            EventSort::DateDesc,
        ),
        AttendedWindow::Upcoming => (
            EventFilter::new().among(ids).starting_from(now),
            EventSort::DateAsc,
        ),
    };

    let request = PageRequest::from_param(page_param, USER_PAGE_SIZE);
    match events.search(&filter, sort, &request).await {
        Ok(page) => page_response(page, users).await,
        Err(e) => {
            error!(error = %e, "Failed to query attended events");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_dates_as_utc_midnight() {
        let date = parse_event_date("2026-09-14").unwrap();
        assert_eq!(date.to_rfc3339(), "2026-09-14T00:00:00+00:00");
    }

    #[test]
    fn parses_rfc3339_dates() {
        let date = parse_event_date("2026-09-14T18:30:00+01:00").unwrap();
        assert_eq!(date.to_rfc3339(), "2026-09-14T17:30:00+00:00");
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(parse_event_date("next friday").is_none());
        assert!(parse_event_date("").is_none());
    }

    #[test]
    fn splits_and_trims_tags() {
        assert_eq!(
            split_tags("music, outdoors ,free"),
            vec!["music", "outdoors", "free"]
        );
        assert!(split_tags(" , ,").is_empty());
        assert!(split_tags("").is_empty());
    }
}
