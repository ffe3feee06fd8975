use std::{sync::Arc, time::Duration};

use lazy_static::lazy_static;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, RefreshRequest, RegisterRequest,
            UpdateUserRequest, UserResponse,
        },
        jwt::{JwtKeys, TokenPair},
        password::{self, CredentialManager},
        repo::UserRepository,
        repo_types::{NewUser, StoredToken, User, UserChanges},
    },
    error::{AppError, AppResult},
    pagination::Pagination,
    repository::{with_deadline, RepoError},
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Hex SHA-256 of a refresh token. Only this digest is persisted.
pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Storage-level uniqueness failures become the same errors as the pre-checks.
fn user_conflict(err: RepoError) -> AppError {
    match err {
        RepoError::UniqueViolation(c) if c.contains("email") => AppError::EmailExists,
        RepoError::UniqueViolation(c) if c.contains("username") => AppError::UsernameExists,
        other => other.into_app("user"),
    }
}

/// Registration, sessions and profile management.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    credentials: CredentialManager,
    keys: JwtKeys,
    timeout: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        credentials: CredentialManager,
        keys: JwtKeys,
        timeout: Duration,
    ) -> Self {
        Self {
            users,
            credentials,
            keys,
            timeout,
        }
    }

    async fn hash_password(&self, password: SecretString) -> AppResult<String> {
        let creds = self.credentials.clone();
        tokio::task::spawn_blocking(move || creds.hash(&password))
            .await
            .map_err(|e| AppError::Internal(e.into()))?
    }

    async fn verify_password(&self, hash: String, candidate: SecretString) -> AppResult<bool> {
        let creds = self.credentials.clone();
        tokio::task::spawn_blocking(move || creds.verify(&hash, &candidate))
            .await
            .map_err(|e| AppError::Internal(e.into()))?
    }

    async fn load_user(&self, id: Uuid) -> AppResult<User> {
        with_deadline(self.timeout, "get_user", self.users.get_user(id))
            .await
            .map_err(|e| e.into_app("user"))
    }

    async fn ensure_email_free(&self, email: &str) -> AppResult<()> {
        match with_deadline(
            self.timeout,
            "get_user_by_email",
            self.users.get_user_by_email(email),
        )
        .await
        {
            Ok(_) => {
                warn!(email = %email, "email already registered");
                Err(AppError::EmailExists)
            }
            Err(RepoError::NotFound) => Ok(()),
            Err(e) => Err(e.into_app("user")),
        }
    }

    async fn ensure_username_free(&self, username: &str) -> AppResult<()> {
        match with_deadline(
            self.timeout,
            "get_user_by_username",
            self.users.get_user_by_username(username),
        )
        .await
        {
            Ok(_) => {
                warn!(username = %username, "username already taken");
                Err(AppError::UsernameExists)
            }
            Err(RepoError::NotFound) => Ok(()),
            Err(e) => Err(e.into_app("user")),
        }
    }

    /// Mint a fresh pair and make its refresh token the only valid one for the user.
    async fn start_session(&self, user: &User) -> AppResult<TokenPair> {
        let tokens = self.keys.issue(user.id)?;
        let stored = StoredToken {
            hash: token_digest(&tokens.refresh_token),
            expires_at: tokens.refresh_expires_at,
        };
        with_deadline(
            self.timeout,
            "update_user_token",
            self.users.update_user_token(user.id, Some(stored)),
        )
        .await
        .map_err(|e| e.into_app("user"))?;
        Ok(tokens)
    }

    pub async fn register(&self, req: RegisterRequest) -> AppResult<MessageResponse> {
        let RegisterRequest {
            username,
            full_name,
            email,
            password,
        } = req;
        let username = normalize(&username);
        let email = normalize(&email);
        let full_name = full_name.trim().to_string();

        if let Err(e) = password::check_policy(&password) {
            warn!("password too short");
            return Err(e);
        }
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::BadEmailFormat);
        }
        if username.is_empty() {
            return Err(AppError::validation("username is required"));
        }
        if full_name.is_empty() {
            return Err(AppError::validation("full name is required"));
        }

        self.ensure_email_free(&email).await?;
        self.ensure_username_free(&username).await?;

        let password_hash = self.hash_password(password).await?;
        let user = with_deadline(
            self.timeout,
            "create_user",
            self.users.create_user(NewUser {
                username,
                full_name,
                email,
                password_hash,
            }),
        )
        .await
        .map_err(user_conflict)?;

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(MessageResponse::new("user created successfully"))
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<LoginResponse> {
        let email = normalize(&req.email);
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::BadEmailFormat);
        }

        let found = match with_deadline(
            self.timeout,
            "get_user_by_email",
            self.users.get_user_by_email(&email),
        )
        .await
        {
            Ok(user) => Some(user),
            Err(RepoError::NotFound) => None,
            Err(e) => return Err(e.into_app("user")),
        };

        let Some(user) = found else {
            // same Argon2 cost as a real attempt
            let _ = self
                .verify_password(self.credentials.dummy_hash().to_owned(), req.password)
                .await;
            warn!(email = %email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        if !self
            .verify_password(user.password_hash.clone(), req.password)
            .await?
        {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let tokens = self.start_session(&user).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(LoginResponse::new(&user, tokens))
    }

    /// Rotate a session. The presented token must be the one stored at the last login or refresh.
    pub async fn refresh(&self, req: RefreshRequest) -> AppResult<LoginResponse> {
        let claims = self.keys.verify_refresh(&req.refresh_token).map_err(|e| {
            warn!(error = %e, "refresh token rejected");
            AppError::InvalidCredentials
        })?;

        let user = match with_deadline(self.timeout, "get_user", self.users.get_user(claims.sub))
            .await
        {
            Ok(user) => user,
            Err(RepoError::NotFound) => {
                warn!(user_id = %claims.sub, "refresh for missing user");
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => return Err(e.into_app("user")),
        };

        let digest = token_digest(&req.refresh_token);
        if !user.has_active_session(&digest, OffsetDateTime::now_utc()) {
            warn!(user_id = %user.id, "refresh token is not the active session");
            return Err(AppError::InvalidCredentials);
        }

        let tokens = self.start_session(&user).await?;
        info!(user_id = %user.id, "session refreshed");
        Ok(LoginResponse::new(&user, tokens))
    }

    /// Clear the stored session. Succeeds when there is nothing to clear.
    pub async fn logout(&self, user_id: Uuid) -> AppResult<MessageResponse> {
        match with_deadline(
            self.timeout,
            "update_user_token",
            self.users.update_user_token(user_id, None),
        )
        .await
        {
            Ok(()) | Err(RepoError::NotFound) => {}
            Err(e) => return Err(e.into_app("user")),
        }
        info!(user_id = %user_id, "user logged out");
        Ok(MessageResponse::new("logged out successfully"))
    }

    pub async fn get_profile(&self, id: Uuid) -> AppResult<UserResponse> {
        Ok(self.load_user(id).await?.into())
    }

    pub async fn list_profiles(&self, page: Pagination) -> AppResult<Vec<UserResponse>> {
        let (limit, offset) = page.clamped();
        let users = with_deadline(self.timeout, "list_users", self.users.list_users(limit, offset))
            .await
            .map_err(|e| e.into_app("user"))?;
        Ok(users.into_iter().map(UserResponse::from).collect())
    }

    pub async fn update_profile(
        &self,
        caller: Uuid,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> AppResult<UserResponse> {
        if caller != id {
            warn!(caller = %caller, target = %id, "profile update by non-owner");
            return Err(AppError::Forbidden);
        }
        let current = self.load_user(id).await?;
        let mut changes = UserChanges::from(&current);

        if let Some(username) = req.username {
            let username = normalize(&username);
            if username.is_empty() {
                return Err(AppError::validation("username is required"));
            }
            if username != current.username {
                self.ensure_username_free(&username).await?;
            }
            changes.username = username;
        }
        if let Some(full_name) = req.full_name {
            let full_name = full_name.trim().to_string();
            if full_name.is_empty() {
                return Err(AppError::validation("full name is required"));
            }
            changes.full_name = full_name;
        }
        if let Some(email) = req.email {
            let email = normalize(&email);
            if !is_valid_email(&email) {
                warn!(email = %email, "invalid email");
                return Err(AppError::BadEmailFormat);
            }
            if email != current.email {
                self.ensure_email_free(&email).await?;
            }
            changes.email = email;
        }
        if let Some(password) = req.password {
            if !password.expose_secret().is_empty() {
                changes.password_hash = self.hash_password(password).await?;
            }
        }

        let user = with_deadline(self.timeout, "update_user", self.users.update_user(changes))
            .await
            .map_err(user_conflict)?;
        info!(user_id = %user.id, "profile updated");
        Ok(user.into())
    }

    pub async fn delete_account(&self, caller: Uuid, id: Uuid) -> AppResult<MessageResponse> {
        if caller != id {
            warn!(caller = %caller, target = %id, "account deletion by non-owner");
            return Err(AppError::Forbidden);
        }
        with_deadline(self.timeout, "delete_user", self.users.delete_user(id))
            .await
            .map_err(|e| e.into_app("user"))?;
        info!(user_id = %id, "user deleted");
        Ok(MessageResponse::new("user deleted successfully"))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        auth::password::fast_config,
        config::JwtConfig,
        error::DependencyError,
        memory::MemoryUserRepository,
    };

    fn keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_minutes: 15,
            refresh_ttl_minutes: 60,
        })
    }

    fn service_with(users: Arc<dyn UserRepository>, timeout: Duration) -> AuthService {
        let creds = CredentialManager::new(&fast_config()).unwrap();
        AuthService::new(users, creds, keys(), timeout)
    }

    fn service() -> AuthService {
        service_with(Arc::new(MemoryUserRepository::default()), Duration::from_secs(2))
    }

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    fn register_req(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            full_name: "Alice Liddell".into(),
            email: email.into(),
            password: secret(password),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: secret(password),
        }
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a@b"));
        assert!(!is_valid_email("alice.example.com"));
        assert!(!is_valid_email("al ice@example.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn digest_is_stable_hex() {
        let d = token_digest("abc");
        assert_eq!(d.len(), 64);
        assert_eq!(d, token_digest("abc"));
        assert_ne!(d, token_digest("abd"));
    }

    #[tokio::test]
    async fn register_normalizes_and_stores() {
        let repo = Arc::new(MemoryUserRepository::default());
        let svc = service_with(repo.clone(), Duration::from_secs(2));
        let out = svc
            .register(register_req(" Alice ", "Alice@Example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(out.message, "user created successfully");

        let stored = repo.get_user_by_email("alice@example.com").await.unwrap();
        assert_eq!(stored.username, "alice");
        assert!(stored.password_hash.starts_with("$argon2id$"));
        assert!(stored.refresh_token_hash.is_none());
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let svc = service();
        assert!(matches!(
            svc.register(register_req("alice", "a@b.com", "short")).await,
            Err(AppError::WeakPassword)
        ));
        assert!(matches!(
            svc.register(register_req("alice", "no-at-sign", "password123")).await,
            Err(AppError::BadEmailFormat)
        ));
        assert!(matches!(
            svc.register(register_req("   ", "a@b.com", "password123")).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn password_policy_is_checked_before_email_shape() {
        let svc = service();
        assert!(matches!(
            svc.register(register_req("x", "noat", "short")).await,
            Err(AppError::WeakPassword)
        ));
    }

    #[tokio::test]
    async fn duplicate_email_collides_across_case() {
        let svc = service();
        svc.register(register_req("alice", "A@b.com", "password123"))
            .await
            .unwrap();
        assert!(matches!(
            svc.register(register_req("bob", "a@b.com", "password123")).await,
            Err(AppError::EmailExists)
        ));
        assert!(matches!(
            svc.register(register_req("ALICE", "c@d.com", "password123")).await,
            Err(AppError::UsernameExists)
        ));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let svc = service();
        svc.register(register_req("alice", "alice@example.com", "password123"))
            .await
            .unwrap();

        let wrong = svc
            .login(login_req("alice@example.com", "not-the-password"))
            .await
            .unwrap_err();
        let unknown = svc
            .login(login_req("nobody@x.com", "password123"))
            .await
            .unwrap_err();
        assert!(matches!(wrong, AppError::InvalidCredentials));
        assert!(matches!(unknown, AppError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert_eq!(wrong.status(), unknown.status());
    }

    #[tokio::test]
    async fn login_issues_tokens_and_stores_digest() {
        let repo = Arc::new(MemoryUserRepository::default());
        let svc = service_with(repo.clone(), Duration::from_secs(2));
        svc.register(register_req("alice", "alice@example.com", "password123"))
            .await
            .unwrap();

        let out = svc
            .login(login_req("ALICE@example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(out.username, "alice");
        assert_eq!(out.token_type, "Bearer");
        let claims = keys().verify_access(&out.access_token).unwrap();
        assert_eq!(claims.sub, out.user_id);

        let stored = repo.get_user(out.user_id).await.unwrap();
        assert_eq!(
            stored.refresh_token_hash.as_deref(),
            Some(token_digest(&out.refresh_token).as_str())
        );
        assert_eq!(stored.refresh_token_expires_at, Some(out.refresh_expires_at));
    }

    #[tokio::test]
    async fn logout_is_idempotent() {
        let repo = Arc::new(MemoryUserRepository::default());
        let svc = service_with(repo.clone(), Duration::from_secs(2));
        svc.register(register_req("alice", "alice@example.com", "password123"))
            .await
            .unwrap();
        let out = svc
            .login(login_req("alice@example.com", "password123"))
            .await
            .unwrap();

        svc.logout(out.user_id).await.unwrap();
        svc.logout(out.user_id).await.unwrap();
        svc.logout(Uuid::new_v4()).await.unwrap();

        let stored = repo.get_user(out.user_id).await.unwrap();
        assert!(stored.refresh_token_hash.is_none());
        assert!(stored.refresh_token_expires_at.is_none());
    }

    #[tokio::test]
    async fn refresh_rotates_and_revokes_previous_token() {
        let svc = service();
        svc.register(register_req("alice", "alice@example.com", "password123"))
            .await
            .unwrap();
        let first = svc
            .login(login_req("alice@example.com", "password123"))
            .await
            .unwrap();

        let second = svc
            .refresh(RefreshRequest {
                refresh_token: first.refresh_token.clone(),
            })
            .await
            .unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);

        assert!(matches!(
            svc.refresh(RefreshRequest {
                refresh_token: first.refresh_token,
            })
            .await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.refresh(RefreshRequest {
                refresh_token: second.access_token.clone(),
            })
            .await,
            Err(AppError::InvalidCredentials)
        ));

        svc.logout(second.user_id).await.unwrap();
        assert!(matches!(
            svc.refresh(RefreshRequest {
                refresh_token: second.refresh_token,
            })
            .await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn update_requires_owner_and_checks_uniqueness() {
        let svc = service();
        svc.register(register_req("alice", "alice@example.com", "password123"))
            .await
            .unwrap();
        svc.register(register_req("bob", "bob@example.com", "password123"))
            .await
            .unwrap();
        let alice = svc
            .login(login_req("alice@example.com", "password123"))
            .await
            .unwrap();
        let bob = svc
            .login(login_req("bob@example.com", "password123"))
            .await
            .unwrap();

        assert!(matches!(
            svc.update_profile(bob.user_id, alice.user_id, UpdateUserRequest::default())
                .await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            svc.delete_account(bob.user_id, alice.user_id).await,
            Err(AppError::Forbidden)
        ));

        let taken = UpdateUserRequest {
            email: Some("BOB@example.com".into()),
            ..Default::default()
        };
        assert!(matches!(
            svc.update_profile(alice.user_id, alice.user_id, taken).await,
            Err(AppError::EmailExists)
        ));

        let change = UpdateUserRequest {
            full_name: Some("Alice L.".into()),
            password: Some(secret("new-password-1")),
            ..Default::default()
        };
        let updated = svc
            .update_profile(alice.user_id, alice.user_id, change)
            .await
            .unwrap();
        assert_eq!(updated.full_name, "Alice L.");
        assert_eq!(updated.email, "alice@example.com");

        assert!(svc
            .login(login_req("alice@example.com", "new-password-1"))
            .await
            .is_ok());
        assert!(matches!(
            svc.login(login_req("alice@example.com", "password123")).await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn delete_removes_profile() {
        let svc = service();
        svc.register(register_req("alice", "alice@example.com", "password123"))
            .await
            .unwrap();
        let alice = svc
            .login(login_req("alice@example.com", "password123"))
            .await
            .unwrap();

        svc.delete_account(alice.user_id, alice.user_id).await.unwrap();
        assert!(matches!(
            svc.get_profile(alice.user_id).await,
            Err(AppError::NotFound("user"))
        ));
        svc.logout(alice.user_id).await.unwrap();
    }

    #[tokio::test]
    async fn list_profiles_pages() {
        let svc = service();
        for name in ["a", "b", "c"] {
            svc.register(register_req(name, &format!("{name}@example.com"), "password123"))
                .await
                .unwrap();
        }
        assert_eq!(svc.list_profiles(Pagination::new(2, 0)).await.unwrap().len(), 2);
        assert_eq!(svc.list_profiles(Pagination::new(2, 2)).await.unwrap().len(), 1);
    }

    /// Lookups miss, but the insert hits the unique constraint, as when two
    /// registrations race past the pre-check.
    struct RacingUsers;

    #[async_trait]
    impl UserRepository for RacingUsers {
        async fn create_user(&self, _new: NewUser) -> Result<User, RepoError> {
            Err(RepoError::UniqueViolation("users_email_key".into()))
        }
        async fn get_user(&self, _id: Uuid) -> Result<User, RepoError> {
            Err(RepoError::NotFound)
        }
        async fn get_user_by_email(&self, _email: &str) -> Result<User, RepoError> {
            Err(RepoError::NotFound)
        }
        async fn get_user_by_username(&self, _username: &str) -> Result<User, RepoError> {
            Err(RepoError::NotFound)
        }
        async fn list_users(&self, _limit: i64, _offset: i64) -> Result<Vec<User>, RepoError> {
            Ok(vec![])
        }
        async fn update_user(&self, _changes: UserChanges) -> Result<User, RepoError> {
            Err(RepoError::NotFound)
        }
        async fn update_user_token(
            &self,
            _id: Uuid,
            _token: Option<StoredToken>,
        ) -> Result<(), RepoError> {
            Ok(())
        }
        async fn delete_user(&self, _id: Uuid) -> Result<(), RepoError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn late_unique_violation_maps_to_email_exists() {
        let svc = service_with(Arc::new(RacingUsers), Duration::from_secs(2));
        assert!(matches!(
            svc.register(register_req("alice", "alice@example.com", "password123"))
                .await,
            Err(AppError::EmailExists)
        ));
    }

    struct StalledUsers;

    #[async_trait]
    impl UserRepository for StalledUsers {
        async fn create_user(&self, _new: NewUser) -> Result<User, RepoError> {
            stall().await
        }
        async fn get_user(&self, _id: Uuid) -> Result<User, RepoError> {
            stall().await
        }
        async fn get_user_by_email(&self, _email: &str) -> Result<User, RepoError> {
            stall().await
        }
        async fn get_user_by_username(&self, _username: &str) -> Result<User, RepoError> {
            stall().await
        }
        async fn list_users(&self, _limit: i64, _offset: i64) -> Result<Vec<User>, RepoError> {
            stall().await
        }
        async fn update_user(&self, _changes: UserChanges) -> Result<User, RepoError> {
            stall().await
        }
        async fn update_user_token(
            &self,
            _id: Uuid,
            _token: Option<StoredToken>,
        ) -> Result<(), RepoError> {
            stall().await
        }
        async fn delete_user(&self, _id: Uuid) -> Result<(), RepoError> {
            stall().await
        }
    }

    async fn stall<T>() -> Result<T, RepoError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(RepoError::NotFound)
    }

    #[tokio::test]
    async fn slow_repository_surfaces_as_timeout() {
        let svc = service_with(Arc::new(StalledUsers), Duration::from_millis(20));
        assert!(matches!(
            svc.login(login_req("alice@example.com", "password123")).await,
            Err(AppError::Dependency(DependencyError::Timeout("get_user_by_email")))
        ));
        assert!(matches!(
            svc.logout(Uuid::new_v4()).await,
            Err(AppError::Dependency(DependencyError::Timeout(_)))
        ));
    }
}
