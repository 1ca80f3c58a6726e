mod config;
mod db;
mod email;
mod handlers;
mod media;
mod middleware;
mod models;
mod query;
mod utils;

use actix_cors::Cors;
use actix_web::{guard, web, App, HttpServer};
use config::AppConfig;
use db::event_repository::EventRepository;
use db::user_repository::UserRepository;
use db::Database;
use dotenv::dotenv;
use email::Mailer;
use media::MediaClient;
use middleware::auth::AuthMiddleware;
use middleware::rate_limit::RateLimitMiddleware;
use std::env;
use tracing::info;
use tracing_actix_web::TracingLogger;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::change_password,
        handlers::auth::forgot_password,
        handlers::auth::reset_password,
        handlers::events::get_all_events,
        handlers::events::get_upcoming_events,
        handlers::events::get_free_events,
        handlers::events::get_single_event,
        handlers::events::create_event,
        handlers::events::get_hosted_events,
        handlers::events::pay_for_event,
        handlers::events::get_previous_events,
        handlers::events::get_events_to_attend,
    ),
    components(
        schemas(
            handlers::health::HealthResponse,
            handlers::health::HealthChecks,
            handlers::auth::RegisterRequest,
            handlers::auth::LoginRequest,
            handlers::auth::ChangePasswordRequest,
            handlers::auth::ForgotPasswordRequest,
            handlers::auth::ResetPasswordRequest,
            handlers::auth::RegisterResponse,
            handlers::auth::AuthResponse,
            handlers::auth::MessageResponse,
            handlers::auth::UserResponse,
            handlers::events::EventListResponse,
            handlers::events::EventFeedResponse,
            handlers::events::SingleEventResponse,
            handlers::events::CreateEventResponse,
            handlers::events::PayEventResponse,
            models::event::Event,
            models::event::EventView,
            models::event::HostSummary,
            models::event::Price,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "Account lifecycle and credential recovery"),
        (name = "Events", description = "Event listing, creation and user-scoped views")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Enter your JWT token"))
                        .build(),
                ),
            );
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing subscriber for structured logging
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .json()
        .init();

    // Configuration is read once here and passed to every component
    let config = AppConfig::from_env().expect("Invalid configuration");

    let database = Database::new(&config.db_path).expect("Failed to initialize database");
    info!(db_path = %config.db_path, "Database initialized");

    let mailer = Mailer::new(&config.smtp).expect("Failed to initialize mailer");
    let media = MediaClient::new(config.media.clone());

    let bind_address = format!("{}:{}", config.host, config.port);

    // One limiter per credential endpoint, built before the worker factory
    // so every worker shares the same per-IP quota.
    let register_limiter = RateLimitMiddleware::per_minute(5);
    let login_limiter = RateLimitMiddleware::per_minute(5);
    let forgot_limiter = RateLimitMiddleware::per_minute(5);

    info!(bind_address = %bind_address, "Starting MB Events API server");
    info!("Available endpoints:");
    info!("   GET  /api/v1/events                - Filtered, paginated listing (public)");
    info!("   GET  /api/v1/events/upcoming       - Next 6 upcoming events (public)");
    info!("   GET  /api/v1/events/free           - Next 6 free events (public)");
    info!("   GET  /api/v1/events/{{id}}           - Single event with similar events (public)");
    info!("   POST /api/v1/events                - Create event (protected)");
    info!("   GET  /api/v1/events/hosted         - Events hosted by caller (protected)");
    info!("   POST /api/v1/events/pay/{{id}}       - Add event to caller's list (protected)");
    info!("   GET  /api/v1/events/previous       - Caller's past events (protected)");
    info!("   GET  /api/v1/events/attending      - Caller's upcoming events (protected)");
    info!("   POST /api/v1/register              - Register new user (public)");
    info!("   POST /api/v1/login                 - Login user (public)");
    info!("   POST /api/v1/change-password       - Change password (protected)");
    info!("   POST /api/v1/forgot-password       - Request reset link (public)");
    info!("   POST /api/v1/reset-password        - Reset password with token (public)");
    info!(
        swagger_url = %format!("http://{}/swagger-ui/", bind_address),
        "Swagger UI available"
    );

    HttpServer::new(move || {
        let user_repo = UserRepository::new(database.clone());
        let event_repo = EventRepository::new(database.clone());

        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        let openapi = ApiDoc::openapi();

        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(user_repo))
            .app_data(web::Data::new(event_repo))
            .app_data(web::Data::new(mailer.clone()))
            .app_data(web::Data::new(media.clone()))
            .wrap(TracingLogger::default())
            .wrap(cors)
            // Swagger UI
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            .route("/", web::get().to(handlers::health::index))
            .route("/api/health", web::get().to(handlers::health::health))
            .service(
                web::scope("/api/v1")
                    // Credential endpoints are rate limited (5 requests per minute per IP)
                    .service(
                        web::resource("/register")
                            .wrap(register_limiter.clone())
                            .route(web::post().to(handlers::auth::register)),
                    )
                    .service(
                        web::resource("/login")
                            .wrap(login_limiter.clone())
                            .route(web::post().to(handlers::auth::login)),
                    )
                    .service(
                        web::resource("/change-password")
                            .wrap(AuthMiddleware::new(config.jwt_secret.clone()))
                            .route(web::post().to(handlers::auth::change_password)),
                    )
                    .service(
                        web::resource("/forgot-password")
                            .wrap(forgot_limiter.clone())
                            .route(web::post().to(handlers::auth::forgot_password)),
                    )
                    .service(
                        web::resource("/reset-password")
                            .route(web::post().to(handlers::auth::reset_password)),
                    )
                    .service(
                        web::scope("/events")
                            // The gate sits on its own resource: the Post
                            // guard claims POST /events, everything else
                            // falls through to the public listing below.
                            .service(
                                web::resource("")
                                    .guard(guard::Post())
                                    .wrap(AuthMiddleware::new(config.jwt_secret.clone()))
                                    .route(web::post().to(handlers::events::create_event)),
                            )
                            .service(
                                web::resource("")
                                    .route(web::get().to(handlers::events::get_all_events)),
                            )
                            .service(
                                web::resource("/upcoming")
                                    .route(web::get().to(handlers::events::get_upcoming_events)),
                            )
                            .service(
                                web::resource("/free")
                                    .route(web::get().to(handlers::events::get_free_events)),
                            )
                            .service(
                                web::resource("/hosted")
                                    .wrap(AuthMiddleware::new(config.jwt_secret.clone()))
                                    .route(web::get().to(handlers::events::get_hosted_events)),
                            )
                            .service(
                                web::resource("/pay/{event_id}")
                                    .wrap(AuthMiddleware::new(config.jwt_secret.clone()))
                                    .route(web::post().to(handlers::events::pay_for_event)),
                            )
                            .service(
                                web::resource("/previous")
                                    .wrap(AuthMiddleware::new(config.jwt_secret.clone()))
                                    .route(web::get().to(handlers::events::get_previous_events)),
                            )
                            .service(
                                web::resource("/attending")
                                    .wrap(AuthMiddleware::new(config.jwt_secret.clone()))
                                    .route(web::get().to(handlers::events::get_events_to_attend)),
                            )
                            .service(
                                web::resource("/{event_id}")
                                    .route(web::get().to(handlers::events::get_single_event)),
                            ),
                    ),
            )
            .default_service(web::route().to(handlers::health::not_found))
    })
    .bind(&bind_address)?
    .run()
    .await
}
