use crate::db::Database;
use crate::models::user::User;
use bincode::{Decode, Encode};
use chrono::{DateTime, Utc};
use std::str;
use tracing::info;

const USERS_TREE: &str = "users";
const EMAIL_INDEX_TREE: &str = "email_index";
// Association tree for the events a user has paid for, keyed
// "{user_id}/{event_id}" so membership checks and inserts are atomic.
const ATTENDANCE_TREE: &str = "attendance";

#[derive(Debug, Encode, Decode)]
pub struct StoredUser {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub reset_token: Option<String>,
    pub reset_token_expiry: Option<i64>,
    pub created_at: i64, // Store as timestamp
}

impl From<User> for StoredUser {
    fn from(user: User) -> Self {
        StoredUser {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            password_hash: user.password_hash,
            reset_token: user.reset_token,
            reset_token_expiry: user.reset_token_expiry.map(|t| t.timestamp()),
            created_at: user.created_at.timestamp(),
        }
    }
}

impl From<StoredUser> for User {
    fn from(stored: StoredUser) -> Self {
        User {
            id: stored.id,
            full_name: stored.full_name,
            email: stored.email,
            password_hash: stored.password_hash,
            reset_token: stored.reset_token,
            reset_token_expiry: stored
                .reset_token_expiry
                .and_then(|t| DateTime::from_timestamp(t, 0)),
            created_at: DateTime::from_timestamp(stored.created_at, 0)
                .unwrap_or_else(Utc::now),
        }
    }
}

pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    pub fn new(db: Database) -> Self {
        UserRepository { db }
    }

    pub async fn create(&self, user: User) -> Result<User, String> {
        let users_tree = self
            .db
            .db
            .open_tree(USERS_TREE)
            .map_err(|e| format!("Failed to open users tree: {}", e))?;

        let email_index = self
            .db
            .db
            .open_tree(EMAIL_INDEX_TREE)
            .map_err(|e| format!("Failed to open email index: {}", e))?;

        // Check if email already exists
        if email_index
            .contains_key(user.email.as_bytes())
            .map_err(|e| e.to_string())?
        {
            return Err("Email already exists".to_string());
        }

        let stored_user = StoredUser::from(user.clone());
        let encoded = bincode::encode_to_vec(&stored_user, bincode::config::standard())
            .map_err(|e| format!("Failed to encode user: {}", e))?;

        users_tree
            .insert(user.id.as_bytes(), encoded.as_slice())
            .map_err(|e| format!("Failed to insert user: {}", e))?;

        // Create email index
        email_index
            .insert(user.email.as_bytes(), user.id.as_bytes())
            .map_err(|e| format!("Failed to create email index: {}", e))?;

        info!(user_id = %user.id, email = %user.email, "User created in database");

        Ok(user)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>, String> {
        let users_tree = self
            .db
            .db
            .open_tree(USERS_TREE)
            .map_err(|e| format!("Failed to open users tree: {}", e))?;

        match users_tree
            .get(id.as_bytes())
            .map_err(|e| format!("Failed to get user: {}", e))?
        {
            Some(data) => {
                let (stored_user, _): (StoredUser, usize) =
                    bincode::decode_from_slice(&data, bincode::config::standard())
                        .map_err(|e| format!("Failed to decode user: {}", e))?;
                Ok(Some(User::from(stored_user)))
            }
            None => Ok(None),
        }
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, String> {
        let email_index = self
            .db
            .db
            .open_tree(EMAIL_INDEX_TREE)
            .map_err(|e| format!("Failed to open email index: {}", e))?;

        match email_index
            .get(email.as_bytes())
            .map_err(|e| format!("Failed to get email index: {}", e))?
        {
            Some(user_id) => {
                let id = str::from_utf8(&user_id).map_err(|e| format!("Invalid user ID: {}", e))?;
                self.get_by_id(id).await
            }
            None => Ok(None),
        }
    }

    async fn save(&self, user: User) -> Result<(), String> {
        let users_tree = self
            .db
            .db
            .open_tree(USERS_TREE)
            .map_err(|e| format!("Failed to open users tree: {}", e))?;

        let id = user.id.clone();
        let stored_user = StoredUser::from(user);
        let encoded = bincode::encode_to_vec(&stored_user, bincode::config::standard())
            .map_err(|e| format!("Failed to encode user: {}", e))?;

        users_tree
            .insert(id.as_bytes(), encoded.as_slice())
            .map_err(|e| format!("Failed to update user: {}", e))?;

        Ok(())
    }

    pub async fn update_password(&self, id: &str, new_password_hash: &str) -> Result<(), String> {
        let mut user = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| "User not found".to_string())?;

        user.password_hash = new_password_hash.to_string();
        self.save(user).await?;

        info!(user_id = %id, "User password updated in database");

        Ok(())
    }

    /// Records the pending reset token issued by the forgot-password flow.
    pub async fn set_reset_token(
        &self,
        id: &str,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> Result<(), String> {
        let mut user = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| "User not found".to_string())?;

        user.reset_token = Some(token.to_string());
        user.reset_token_expiry = Some(expiry);
        self.save(user).await?;

        info!(user_id = %id, "Reset token stored");

        Ok(())
    }

    /// Overwrites the password and consumes the reset token in one write.
    pub async fn reset_password(&self, id: &str, new_password_hash: &str) -> Result<(), String> {
        let mut user = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| "User not found".to_string())?;

        user.password_hash = new_password_hash.to_string();
        user.reset_token = None;
        user.reset_token_expiry = None;
        self.save(user).await?;

        info!(user_id = %id, "User password reset in database");

        Ok(())
    }

    /// Atomic add-if-absent for the user's paid events. Returns false when
    /// the pair was already present, so a duplicate pay never appends twice
    /// even under concurrent submissions.
    pub async fn add_attending(&self, user_id: &str, event_id: &str) -> Result<bool, String> {
        let attendance = self
            .db
            .db
            .open_tree(ATTENDANCE_TREE)
            .map_err(|e| format!("Failed to open attendance tree: {}", e))?;

        let key = format!("{}/{}", user_id, event_id);
        let paid_at = Utc::now().timestamp().to_be_bytes().to_vec();

        match attendance
            .compare_and_swap(key.as_bytes(), Option::<&[u8]>::None, Some(paid_at))
            .map_err(|e| format!("Failed to record attendance: {}", e))?
        {
            Ok(()) => {
                info!(user_id = %user_id, event_id = %event_id, "Attendance recorded");
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Ids of every event the user has paid for, in key order.
    pub async fn attending_ids(&self, user_id: &str) -> Result<Vec<String>, String> {
        let attendance = self
            .db
            .db
            .open_tree(ATTENDANCE_TREE)
            .map_err(|e| format!("Failed to open attendance tree: {}", e))?;

        let prefix = format!("{}/", user_id);
        let mut ids = Vec::new();
        for entry in attendance.scan_prefix(prefix.as_bytes()) {
            let (key, _) = entry.map_err(|e| format!("Failed to scan attendance: {}", e))?;
            let key = str::from_utf8(&key).map_err(|e| format!("Invalid attendance key: {}", e))?;
            ids.push(key[prefix.len()..].to_string());
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn create_test_user() -> User {
        User {
            id: uuid::Uuid::new_v4().to_string(),
            full_name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            password_hash: "hashed_password".to_string(),
            reset_token: None,
            reset_token_expiry: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepository::new(db);
        let user = create_test_user();

        let created = repo.create(user.clone()).await.unwrap();
        assert_eq!(created.id, user.id);

        let retrieved = repo.get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(retrieved.email, user.email);
        assert_eq!(retrieved.full_name, user.full_name);
    }

    #[tokio::test]
    async fn test_get_by_email() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepository::new(db);
        let user = create_test_user();

        repo.create(user.clone()).await.unwrap();

        let retrieved = repo.get_by_email(&user.email).await.unwrap().unwrap();
        assert_eq!(retrieved.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepository::new(db);
        let user1 = create_test_user();

        repo.create(user1.clone()).await.unwrap();

        let mut user2 = create_test_user();
        user2.id = uuid::Uuid::new_v4().to_string();
        user2.email = user1.email.clone();

        let result = repo.create(user2).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("already exists"));
    }

    #[tokio::test]
    async fn test_update_password() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepository::new(db);
        let user = create_test_user();

        repo.create(user.clone()).await.unwrap();
        repo.update_password(&user.id, "new_hash").await.unwrap();

        let retrieved = repo.get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(retrieved.password_hash, "new_hash");
    }

    #[tokio::test]
    async fn test_reset_token_roundtrip() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepository::new(db);
        let user = create_test_user();

        repo.create(user.clone()).await.unwrap();

        let expiry = Utc::now() + Duration::minutes(15);
        repo.set_reset_token(&user.id, "reset-token", expiry)
            .await
            .unwrap();

        let retrieved = repo.get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(retrieved.reset_token.as_deref(), Some("reset-token"));
        assert_eq!(
            retrieved.reset_token_expiry.map(|t| t.timestamp()),
            Some(expiry.timestamp())
        );

        repo.reset_password(&user.id, "reset_hash").await.unwrap();

        let retrieved = repo.get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(retrieved.password_hash, "reset_hash");
        assert!(retrieved.reset_token.is_none());
        assert!(retrieved.reset_token_expiry.is_none());
    }

    #[tokio::test]
    async fn test_add_attending_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepository::new(db);
        let user = create_test_user();

        repo.create(user.clone()).await.unwrap();

        assert!(repo.add_attending(&user.id, "event-1").await.unwrap());
        assert!(!repo.add_attending(&user.id, "event-1").await.unwrap());

        let ids = repo.attending_ids(&user.id).await.unwrap();
        assert_eq!(ids, vec!["event-1".to_string()]);
    }

    #[tokio::test]
    async fn test_attending_ids_are_scoped_per_user() {
        let db = Database::in_memory().unwrap();
        let repo = UserRepository::new(db);

        repo.add_attending("user-a", "event-1").await.unwrap();
        repo.add_attending("user-a", "event-2").await.unwrap();
        repo.add_attending("user-b", "event-3").await.unwrap();

        let ids = repo.attending_ids("user-a").await.unwrap();
        assert_eq!(
            ids,
            vec!["event-1".to_string(), "event-2".to_string()]
        );
        assert_eq!(repo.attending_ids("user-c").await.unwrap(), Vec::<String>::new());
    }
}
