use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::{hash_password, verify_password, JwtManager};
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::store::Datastore;
use crate::utils::validation::validate_registration;

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Clone)]
pub struct AccountService {
    store: Datastore,
    jwt: Arc<JwtManager>,
    admin_emails: HashSet<String>,
}

impl AccountService {
    pub fn new(store: Datastore, jwt: Arc<JwtManager>, admin_emails: &[String]) -> Self {
        Self {
            store,
            jwt,
            admin_emails: admin_emails.iter().map(|e| normalize_email(e)).collect(),
        }
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.store.users().get_active(User::natural_id(email)).await
    }

    /// The account id is derived from the email, so the insert itself rejects a second
    /// registration of the same address, concurrent or not.
    pub async fn register(&self, request: &RegisterRequest) -> AppResult<UserSummary> {
        validate_registration(request)?;

        let email = normalize_email(&request.email);
        let role = if self.admin_emails.contains(&email) {
            UserRole::Admin
        } else {
            UserRole::User
        };

        let now = Utc::now();
        let user = User {
            id: User::natural_id(&email),
            email,
            password_hash: hash_password(&request.password)?,
            first_name: request.first_name.clone().unwrap_or_default(),
            last_name: request.last_name.clone().unwrap_or_default(),
            role,
            research_interests: request.research_interests.clone(),
            favourite_resources: Vec::new(),
            status: RecordStatus::Active,
            created_at: now,
            updated_at: now,
        };

        match self.store.users().insert(&user).await {
            Ok(()) => {}
            Err(AppError::Validation(_)) => {
                return Err(AppError::validation("Email is already registered"));
            }
            Err(e) => return Err(e),
        }

        info!("Registered user {} as {:?}", user.id, user.role);
        Ok(UserSummary::from(&user))
    }

    pub async fn login(&self, request: &LoginRequest) -> AppResult<Session> {
        let user = self
            .find_by_email(&request.email)
            .await?
            .ok_or_else(|| AppError::Unauthorized("No user found".to_string()))?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AppError::Unauthorized("Unauthorized Access".to_string()));
        }

        let token = self.jwt.issue(&user)?;
        info!("User {} logged in", user.id);
        Ok(Session {
            token,
            user: UserSummary::from(&user),
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> AppResult<UserSummary> {
        self.store
            .users()
            .get_active(user_id)
            .await?
            .map(|user| UserSummary::from(&user))
            .ok_or_else(|| AppError::not_found("No user found"))
    }

    pub async fn set_role(&self, email: &str, role: UserRole) -> AppResult<UserSummary> {
        let mut user = self
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::not_found(format!("No user registered as {}", email)))?;

        user.role = role;
        user.updated_at = Utc::now();
        self.store.users().replace(&user).await?;

        info!("User {} now has role {:?}", user.id, role);
        Ok(UserSummary::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn accounts_with_admins(admins: &[String]) -> AccountService {
        AccountService::new(
            Datastore::in_memory(),
            Arc::new(JwtManager::new(&Config::default().auth)),
            admins,
        )
    }

    fn accounts() -> AccountService {
        accounts_with_admins(&[])
    }

    fn registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "secret-password".to_string(),
            first_name: Some("Grace".to_string()),
            last_name: Some("Hopper".to_string()),
            research_interests: vec!["compilers".to_string()],
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let accounts = accounts();
        let registered = accounts.register(&registration("Grace@Example.org")).await.unwrap();
        assert_eq!(registered.email, "grace@example.org");

        let session = accounts
            .login(&LoginRequest {
                email: "grace@example.org".to_string(),
                password: "secret-password".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.user.id, registered.id);
        assert!(!session.token.is_empty());

        let wrong = accounts
            .login(&LoginRequest {
                email: "grace@example.org".to_string(),
                password: "nope-nope".to_string(),
            })
            .await;
        assert!(matches!(wrong, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let accounts = accounts();
        accounts.register(&registration("a@b.org")).await.unwrap();
        assert!(matches!(
            accounts.register(&registration("A@B.org")).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_set_role() {
        let accounts = accounts();
        let user = accounts.register(&registration("admin@b.org")).await.unwrap();
        let promoted = accounts.set_role("admin@b.org", UserRole::Admin).await.unwrap();
        assert_eq!(promoted.id, user.id);
        assert_eq!(accounts.profile(user.id).await.unwrap().role, UserRole::Admin);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_store_one_account() {
        let accounts = accounts();
        let attempts = (0..8).map(|_| {
            let accounts = accounts.clone();
            tokio::spawn(async move { accounts.register(&registration("dup@b.org")).await })
        });

        let mut registered = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            match attempt.await.unwrap() {
                Ok(_) => registered += 1,
                Err(e) => assert!(matches!(e, AppError::Validation(_))),
            }
        }

        assert_eq!(registered, 1);
        let stored = accounts
            .store
            .users()
            .find(|user| user.email == "dup@b.org")
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn test_configured_admin_emails_register_as_admin() {
        let accounts = accounts_with_admins(&["Root@B.org".to_string()]);
        let admin = accounts.register(&registration("root@b.org")).await.unwrap();
        let user = accounts.register(&registration("user@b.org")).await.unwrap();

        assert_eq!(admin.role, UserRole::Admin);
        assert_eq!(user.role, UserRole::User);
    }
}
