use crate::config::AppConfig;
use crate::db::user_repository::UserRepository;
use crate::email::Mailer;
use crate::models::user::{Claims, User};
use crate::utils::auth::{
    create_jwt, create_reset_jwt, decode_reset_jwt, hash_password, password_meets_policy,
    verify_password,
};
use actix_web::{web, HttpResponse, Responder};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub full_name: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: UserResponse,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub user: UserResponse,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// Register a new user and send a best-effort welcome email
#[utoipa::path(
    post,
    path = "/api/v1/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = RegisterResponse),
        (status = 400, description = "Missing required fields"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Authentication"
)]
pub async fn register(
    users: web::Data<UserRepository>,
    mailer: web::Data<Mailer>,
    config: web::Data<AppConfig>,
    payload: web::Json<RegisterRequest>,
) -> impl Responder {
    info!(email = %payload.email, "Registration attempt");

    if payload.full_name.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.password.is_empty()
    {
        warn!(email = %payload.email, "Registration failed: missing fields");
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": "Full name, email, and password are required"
        }));
    }

    match users.get_by_email(&payload.email).await {
        Ok(Some(_)) => {
            warn!(email = %payload.email, "Registration failed: email already exists");
            return HttpResponse::Conflict().json(serde_json::json!({
                "success": false,
                "message": "User already exists"
            }));
        }
        Ok(None) => {}
        Err(e) => {
            error!(error = %e, "Database error during registration");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    }

    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = ?e, "Failed to hash password");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        full_name: payload.full_name.trim().to_string(),
        email: payload.email.trim().to_string(),
        password_hash,
        reset_token: None,
        reset_token_expiry: None,
        created_at: Utc::now(),
    };

    let user = match users.create(user).await {
        Ok(u) => u,
        Err(e) => {
            if e.contains("already exists") {
                warn!(email = %payload.email, "Registration failed: email already exists");
                return HttpResponse::Conflict().json(serde_json::json!({
                    "success": false,
                    "message": "User already exists"
                }));
            }
            error!(error = %e, "Failed to create user in database");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Failed to create user"
            }));
        }
    };

    // The account exists at this point; a failed welcome mail is logged
    // and never fails the registration.
    let client_url = format!("{}/login", config.frontend_url);
    if let Err(e) = mailer
        .send_welcome_email(&user.email, &user.full_name, &client_url)
        .await
    {
        error!(error = %e, email = %user.email, "Failed to send welcome email");
    }

    info!(user_id = %user.id, email = %user.email, "User registered successfully");

    HttpResponse::Created().json(RegisterResponse {
        success: true,
        message: "User registered successfully".to_string(),
        user: UserResponse::from(user),
    })
}

/// Login an existing user
#[utoipa::path(
    post,
    path = "/api/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Authentication"
)]
pub async fn login(
    users: web::Data<UserRepository>,
    config: web::Data<AppConfig>,
    payload: web::Json<LoginRequest>,
) -> impl Responder {
    info!(email = %payload.email, "Login attempt");

    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": "Email and password are required"
        }));
    }

    let user = match users.get_by_email(&payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %payload.email, "Login failed: user not found");
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "success": false,
                "message": "Invalid credentials"
            }));
        }
        Err(e) => {
            error!(error = %e, "Database error during login");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    if !verify_password(&payload.password, &user.password_hash) {
        warn!(email = %payload.email, "Login failed: invalid credentials");
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "success": false,
            "message": "Invalid credentials"
        }));
    }

    let token = match create_jwt(&user.id, &user.email, &config.jwt_secret) {
        Ok(t) => t,
        Err(e) => {
            error!(error = ?e, email = %payload.email, "Failed to generate JWT");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Failed to generate token"
            }));
        }
    };

    info!(email = %payload.email, user_id = %user.id, "User logged in successfully");

    HttpResponse::Ok().json(AuthResponse {
        success: true,
        token,
        user: UserResponse::from(user),
    })
}

/// Change the caller's password (protected)
#[utoipa::path(
    post,
    path = "/api/v1/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed successfully", body = MessageResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Unauthorized or incorrect old password")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Authentication"
)]
pub async fn change_password(
    claims: web::ReqData<Claims>,
    users: web::Data<UserRepository>,
    payload: web::Json<ChangePasswordRequest>,
) -> impl Responder {
    if payload.old_password.is_empty() || payload.new_password.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": "Provide the old password and a new password"
        }));
    }

    if !password_meets_policy(&payload.new_password) {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": "New password must include at least one uppercase letter, one lowercase letter, one number, and one special character"
        }));
    }

    if payload.old_password == payload.new_password {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": "New password must be different from old password"
        }));
    }

    let user = match users.get_by_id(&claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "success": false,
                "message": "User not found"
            }));
        }
        Err(e) => {
            error!(error = %e, "Failed to fetch user from database");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    if !verify_password(&payload.old_password, &user.password_hash) {
        warn!(user_id = %claims.sub, "Password change failed: old password incorrect");
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "success": false,
            "message": "Old password is incorrect"
        }));
    }

    let new_password_hash = match hash_password(&payload.new_password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = ?e, "Failed to hash password");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    if let Err(e) = users.update_password(&claims.sub, &new_password_hash).await {
        error!(error = %e, "Failed to update password");
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "success": false,
            "message": "Failed to update password"
        }));
    }

    info!(user_id = %claims.sub, "User changed password");

    HttpResponse::Ok().json(MessageResponse {
        success: true,
        message: "Password changed successfully".to_string(),
    })
}

/// Start the password-reset flow: store a short-lived token and email a
/// reset link
#[utoipa::path(
    post,
    path = "/api/v1/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link sent", body = MessageResponse),
        (status = 400, description = "Email is required"),
        (status = 404, description = "User not found")
    ),
    tag = "Authentication"
)]
pub async fn forgot_password(
    users: web::Data<UserRepository>,
    mailer: web::Data<Mailer>,
    config: web::Data<AppConfig>,
    payload: web::Json<ForgotPasswordRequest>,
) -> impl Responder {
    if payload.email.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": "Email is required"
        }));
    }

    let user = match users.get_by_email(&payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "success": false,
                "message": "User not found"
            }));
        }
        Err(e) => {
            error!(error = %e, "Database error during forgot-password");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    let reset_token = match create_reset_jwt(&user.id, &config.jwt_secret) {
        Ok(t) => t,
        Err(e) => {
            error!(error = ?e, user_id = %user.id, "Failed to generate reset token");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Failed to generate reset token"
            }));
        }
    };

    let expiry = Utc::now() + Duration::minutes(15);
    if let Err(e) = users.set_reset_token(&user.id, &reset_token, expiry).await {
        error!(error = %e, user_id = %user.id, "Failed to store reset token");
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "success": false,
            "message": "Something went wrong"
        }));
    }

    let reset_url = format!(
        "{}/reset-password?token={}",
        config.frontend_url, reset_token
    );
    if let Err(e) = mailer
        .send_reset_password_email(&user.email, &user.full_name, &reset_url)
        .await
    {
        error!(error = %e, email = %user.email, "Failed to send reset email");
    }

    info!(user_id = %user.id, "Password reset link issued");

    HttpResponse::Ok().json(MessageResponse {
        success: true,
        message: "Password reset link sent to your email".to_string(),
    })
}

/// The presented token must be the one most recently stored for the user
/// and its expiry timestamp must still be in the future.
fn reset_token_is_current(user: &User, token: &str, now: DateTime<Utc>) -> bool {
    let matches = user.reset_token.as_deref() == Some(token);
    let live = user
        .reset_token_expiry
        .map(|expiry| expiry > now)
        .unwrap_or(false);
    matches && live
}

/// Complete the password-reset flow
#[utoipa::path(
    post,
    path = "/api/v1/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired token")
    ),
    tag = "Authentication"
)]
pub async fn reset_password(
    users: web::Data<UserRepository>,
    config: web::Data<AppConfig>,
    payload: web::Json<ResetPasswordRequest>,
) -> impl Responder {
    if payload.token.is_empty() || payload.new_password.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": "Provide a token and a new password"
        }));
    }

    let reset_claims = match decode_reset_jwt(&payload.token, &config.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = ?e, "Password reset failed: bad token");
            return HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "message": "Invalid or expired token"
            }));
        }
    };

    let user = match users.get_by_id(&reset_claims.sub).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "success": false,
                "message": "Invalid or expired token"
            }));
        }
        Err(e) => {
            error!(error = %e, "Database error during password reset");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    if !reset_token_is_current(&user, &payload.token, Utc::now()) {
        warn!(user_id = %user.id, "Password reset failed: stale or mismatched token");
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": "Invalid or expired token"
        }));
    }

    let new_password_hash = match hash_password(&payload.new_password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = ?e, "Failed to hash password");
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": "Something went wrong"
            }));
        }
    };

    if let Err(e) = users.reset_password(&user.id, &new_password_hash).await {
        error!(error = %e, user_id = %user.id, "Failed to reset password");
        return HttpResponse::InternalServerError().json(serde_json::json!({
            "success": false,
            "message": "Failed to reset password"
        }));
    }

    info!(user_id = %user.id, "Password reset successfully");

    HttpResponse::Ok().json(MessageResponse {
        success: true,
        message: "Password has been reset successfully".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_token(token: Option<&str>, expiry: Option<DateTime<Utc>>) -> User {
        User {
            id: "user-1".to_string(),
            full_name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "hash".to_string(),
            reset_token: token.map(str::to_string),
            reset_token_expiry: expiry,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn accepts_the_stored_unexpired_token() {
        let now = Utc::now();
        let user = user_with_token(Some("tok"), Some(now + Duration::minutes(10)));
        assert!(reset_token_is_current(&user, "tok", now));
    }

    #[test]
    fn rejects_an_expired_token() {
        let now = Utc::now();
        let user = user_with_token(Some("tok"), Some(now - Duration::minutes(1)));
        assert!(!reset_token_is_current(&user, "tok", now));
    }

    #[test]
    fn rejects_a_mismatched_token() {
        let now = Utc::now();
        let user = user_with_token(Some("tok"), Some(now + Duration::minutes(10)));
        assert!(!reset_token_is_current(&user, "other", now));
    }

    #[test]
    fn rejects_when_no_reset_is_pending() {
        let user = user_with_token(None, None);
        assert!(!reset_token_is_current(&user, "tok", Utc::now()));
    }
}
