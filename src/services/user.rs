// src/services/user.rs
use std::sync::Arc;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use lazy_static::lazy_static;
use uuid::Uuid;

use super::{spawn_action, ServiceError, ACTION_LOGIN, ACTION_REGISTER};
use crate::models::user::User;
use crate::store::Store;

lazy_static! {
    // verified against when the login is unknown, so a miss costs the
    // same bcrypt work as a wrong password
    static ref DUMMY_HASH: String =
        hash("not-a-real-password", DEFAULT_COST).expect("hashing a constant cannot fail");
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user_id: Uuid,
    pub is_admin: bool,
    pub is_super_admin: bool,
}

pub struct UserService {
    store: Arc<dyn Store>,
    daily_limit: i32,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, daily_limit: i32) -> Self {
        Self { store, daily_limit }
    }

    /// Creates a user with a bcrypt-hashed password, both admin flags off
    /// and the configured daily message quota.
    pub async fn register(&self, login: &str, password: &str) -> Result<Uuid, ServiceError> {
        if login.trim().is_empty() || password.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "login and password must not be empty".to_string(),
            ));
        }

        let pass_hash = hash(password, DEFAULT_COST).map_err(|e| {
            tracing::error!("failed to hash password: {}", e);
            ServiceError::Internal
        })?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            login: login.to_string(),
            pass_hash,
            is_admin: false,
            is_super_admin: false,
            messages_per_day: self.daily_limit,
            messages_left_for_today: self.daily_limit,
            created_at: now,
            updated_at: now,
        };

        self.store.create_user(&user).await?;

        tracing::info!(user_id = %user.id, login = %user.login, "user registered");
        spawn_action(
            &self.store,
            ACTION_REGISTER,
            user.id,
            format!("user {} registered", user.login),
        );

        Ok(user.id)
    }

    /// Checks the credentials and returns the user's id and admin flags.
    /// Unknown logins and wrong passwords are indistinguishable to the
    /// caller.
    pub async fn login(&self, login: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        if login.is_empty() || password.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "login and password must not be empty".to_string(),
            ));
        }

        let user = match self.store.user_by_login(login).await? {
            Some(user) => user,
            None => {
                let _ = verify(password, &DUMMY_HASH);
                tracing::info!(login = %login, "login attempt for unknown user");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        let ok = verify(password, &user.pass_hash).map_err(|e| {
            tracing::error!("failed to verify password: {}", e);
            ServiceError::Internal
        })?;
        if !ok {
            tracing::info!(user_id = %user.id, "wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "user logged in");
        spawn_action(
            &self.store,
            ACTION_LOGIN,
            user.id,
            format!("user {} logged in", user.login),
        );

        Ok(LoginOutcome {
            user_id: user.id,
            is_admin: user.is_admin,
            is_super_admin: user.is_super_admin,
        })
    }

    /// Restores every user's remaining quota to their daily allowance.
    /// Driven by the midnight loop in main.
    pub async fn reset_daily_limits(&self) -> Result<u64, ServiceError> {
        let affected = self.store.reset_daily_limits().await?;
        tracing::info!(users = affected, "daily message limits reset");
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemStore;

    fn service(store: Arc<MemStore>) -> UserService {
        UserService::new(store, 100)
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = Arc::new(MemStore::new());
        let svc = service(Arc::clone(&store));

        let user_id = svc.register("alice", "s3cret").await.unwrap();
        let outcome = svc.login("alice", "s3cret").await.unwrap();

        assert_eq!(outcome.user_id, user_id);
        assert!(!outcome.is_admin);
        assert!(!outcome.is_super_admin);

        let user = store.user(user_id).unwrap();
        assert_eq!(user.messages_per_day, 100);
        assert_eq!(user.messages_left_for_today, 100);
        // never stored in the clear
        assert_ne!(user.pass_hash, "s3cret");
    }

    #[tokio::test]
    async fn test_register_empty_fields_rejected() {
        let store = Arc::new(MemStore::new());
        let svc = service(store);

        assert!(matches!(
            svc.register("", "pw").await.unwrap_err(),
            ServiceError::InvalidArgument(_)
        ));
        assert!(matches!(
            svc.register("bob", "").await.unwrap_err(),
            ServiceError::InvalidArgument(_)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_register_is_already_exists() {
        let store = Arc::new(MemStore::new());
        let svc = service(store);

        svc.register("alice", "pw1").await.unwrap();
        let err = svc.register("alice", "pw2").await.unwrap_err();

        assert!(matches!(err, ServiceError::AlreadyExists));
    }

    #[tokio::test]
    async fn test_unknown_login_is_invalid_credentials() {
        let store = Arc::new(MemStore::new());
        let svc = service(store);

        // not NotFound: the caller must not learn whether the login exists
        let err = svc.login("ghost", "pw").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_wrong_password_is_invalid_credentials() {
        let store = Arc::new(MemStore::new());
        let svc = service(store);

        svc.register("alice", "right").await.unwrap();
        let err = svc.login("alice", "wrong").await.unwrap_err();

        assert!(matches!(err, ServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_reset_daily_limits_restores_allowance() {
        let store = Arc::new(MemStore::new());
        let drained = store.seed_user("drained", "x", 0);
        let svc = service(Arc::clone(&store));

        let affected = svc.reset_daily_limits().await.unwrap();

        assert_eq!(affected, 1);
        assert_eq!(store.user(drained).unwrap().messages_left_for_today, 100);
    }
}
