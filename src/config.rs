use std::env;

pub const DEFAULT_JWT_SECRET: &str = "your-secret-key-change-in-production";

#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    pub use_tls: bool,
}

#[derive(Clone)]
pub struct MediaSettings {
    pub upload_url: String,
    pub upload_preset: String,
    pub folder: String,
}

/// Process configuration, read from the environment exactly once at
/// startup and passed to every component through app data. Nothing else
/// in the crate touches environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub frontend_url: String,
    pub smtp: SmtpSettings,
    pub media: MediaSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "1025".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid SMTP_PORT: {}", e))?;

        let cloud_name = env::var("CLOUD_NAME").unwrap_or_else(|_| "demo".to_string());

        Ok(AppConfig {
            host,
            port,
            db_path: env::var("DB_PATH").unwrap_or_else(|_| "./data/sled.db".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            smtp: SmtpSettings {
                host: env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: smtp_port,
                username: env::var("SMTP_USERNAME").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                from_email: env::var("EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| "noreply@localhost".to_string()),
                from_name: env::var("EMAIL_FROM_NAME")
                    .unwrap_or_else(|_| "MB Events".to_string()),
                use_tls: env::var("SMTP_USE_TLS")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false),
            },
            media: MediaSettings {
                upload_url: env::var("CLOUD_UPLOAD_URL").unwrap_or_else(|_| {
                    format!("https://api.cloudinary.com/v1_1/{}/image/upload", cloud_name)
                }),
                upload_preset: env::var("CLOUD_UPLOAD_PRESET")
                    .unwrap_or_else(|_| "unsigned".to_string()),
                folder: env::var("CLOUD_FOLDER").unwrap_or_else(|_| "mbevents".to_string()),
            },
        })
    }

    pub fn uses_default_jwt_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}
