use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

const EVENT_CAPACITY: usize = 16;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UserMetadata {
    pub fn full_name(name: impl Into<String>) -> Self {
        Self {
            full_name: Some(name.into()),
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
    pub aud: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.user_metadata
            .full_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Payload returned by password sign-in and sign-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: Option<User>,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<Session>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_session(&self) -> Result<Option<Session>, ProviderError>;

    /// Stream of session changes for the lifetime of the provider.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ProviderError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: UserMetadata,
    ) -> Result<AuthResponse, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;
}

struct Account {
    password: String,
    user: User,
}

/// In-process provider. Sign-up does not start a session, mirroring a
/// provider that requires email confirmation.
pub struct LocalIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    session: Mutex<Option<Session>>,
    outage: Mutex<Option<ProviderError>>,
    events: broadcast::Sender<AuthEvent>,
    session_ttl: Duration,
}

impl std::fmt::Debug for LocalIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalIdentityProvider")
            .field("accounts", &self.accounts.lock().len())
            .field("signed_in", &self.session.lock().is_some())
            .finish()
    }
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            accounts: Mutex::new(HashMap::new()),
            session: Mutex::new(None),
            outage: Mutex::new(None),
            events,
            session_ttl: Duration::hours(1),
        }
    }

    /// Registers a confirmed account.
    pub fn with_account(self, email: &str, password: &str, full_name: &str) -> Self {
        let user = new_user(email, UserMetadata::full_name(full_name));
        self.accounts.lock().insert(
            email.to_ascii_lowercase(),
            Account {
                password: password.to_string(),
                user,
            },
        );
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Makes every subsequent call fail with `error` until cleared with `None`.
    pub fn set_outage(&self, error: Option<ProviderError>) {
        *self.outage.lock() = error;
    }

    /// Drops the active session as if its token expired, notifying subscribers.
    pub fn expire_session(&self) {
        if self.session.lock().take().is_some() {
            self.emit(AuthEventKind::SignedOut, None);
        }
    }

    fn check_outage(&self) -> Result<(), ProviderError> {
        match self.outage.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn emit(&self, kind: AuthEventKind, session: Option<Session>) {
        // No subscribers is not an error.
        let receivers = self.events.send(AuthEvent { kind, session }).unwrap_or(0);
        debug!(?kind, receivers, "auth event");
    }
}

fn new_user(email: &str, user_metadata: UserMetadata) -> User {
    User {
        id: Uuid::new_v4().to_string(),
        email: Some(email.to_string()),
        user_metadata,
        aud: "authenticated".to_string(),
        created_at: Utc::now(),
    }
}

fn invalid_credentials() -> ProviderError {
    ProviderError::new("invalid_credentials", "Invalid login credentials", Some(400))
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        self.check_outage()?;
        let (session, expired) = {
            let mut slot = self.session.lock();
            if slot.as_ref().is_some_and(|s| s.expires_at <= Utc::now()) {
                (None, slot.take().is_some())
            } else {
                (slot.clone(), false)
            }
        };
        if expired {
            self.emit(AuthEventKind::SignedOut, None);
        }
        Ok(session)
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ProviderError> {
        self.check_outage()?;
        let user = {
            let accounts = self.accounts.lock();
            match accounts.get(&email.to_ascii_lowercase()) {
                Some(account) if account.password == password => account.user.clone(),
                _ => return Err(invalid_credentials()),
            }
        };

        let session = Session {
            access_token: Uuid::new_v4().simple().to_string(),
            expires_at: Utc::now() + self.session_ttl,
            user: user.clone(),
        };
        *self.session.lock() = Some(session.clone());
        self.emit(AuthEventKind::SignedIn, Some(session.clone()));

        Ok(AuthResponse {
            user: Some(user),
            session: Some(session),
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: UserMetadata,
    ) -> Result<AuthResponse, ProviderError> {
        self.check_outage()?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(ProviderError::new(
                "weak_password",
                format!("Password should be at least {MIN_PASSWORD_LEN} characters."),
                Some(422),
            ));
        }

        let key = email.to_ascii_lowercase();
        let mut accounts = self.accounts.lock();
        if accounts.contains_key(&key) {
            return Err(ProviderError::new(
                "user_already_exists",
                "User already registered",
                Some(422),
            ));
        }

        let user = new_user(email, metadata);
        accounts.insert(
            key,
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );

        Ok(AuthResponse {
            user: Some(user),
            session: None,
        })
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.check_outage()?;
        self.session.lock().take();
        self.emit(AuthEventKind::SignedOut, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LocalIdentityProvider {
        LocalIdentityProvider::new().with_account("teacher@school.edu", "secret123", "Ms. Rivera")
    }

    #[tokio::test]
    async fn sign_in_starts_session_and_notifies() {
        let provider = provider();
        let mut events = provider.subscribe();

        let response = provider
            .sign_in_with_password("Teacher@School.edu", "secret123")
            .await
            .unwrap();
        let user = response.user.unwrap();
        assert_eq!(user.display_name(), "Ms. Rivera");

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, AuthEventKind::SignedIn);
        assert_eq!(provider.get_session().await.unwrap().map(|s| s.user), Some(user));
    }

    #[tokio::test]
    async fn expired_session_is_dropped_with_sign_out_event() {
        let provider = LocalIdentityProvider::new()
            .with_session_ttl(Duration::zero())
            .with_account("teacher@school.edu", "secret123", "Ms. Rivera");
        let mut events = provider.subscribe();
        provider
            .sign_in_with_password("teacher@school.edu", "secret123")
            .await
            .unwrap();

        assert!(provider.get_session().await.unwrap().is_none());
        assert_eq!(events.recv().await.unwrap().kind, AuthEventKind::SignedIn);
        let expired = events.recv().await.unwrap();
        assert_eq!(expired.kind, AuthEventKind::SignedOut);
        assert!(expired.session.is_none());
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let err = provider()
            .sign_in_with_password("teacher@school.edu", "nope")
            .await
            .unwrap_err();
        assert_eq!(err.code, "invalid_credentials");
        assert_eq!(err.status, Some(400));
    }

    #[tokio::test]
    async fn sign_up_creates_account_without_session() {
        let provider = provider();
        let response = provider
            .sign_up("new@school.edu", "hunter22", UserMetadata::full_name("Mr. Okafor"))
            .await
            .unwrap();
        assert!(response.session.is_none());
        assert_eq!(
            response.user.unwrap().user_metadata.full_name.as_deref(),
            Some("Mr. Okafor")
        );
        assert!(provider.get_session().await.unwrap().is_none());

        let duplicate = provider
            .sign_up("new@school.edu", "hunter22", UserMetadata::default())
            .await
            .unwrap_err();
        assert_eq!(duplicate.code, "user_already_exists");
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let provider = provider();
        provider.set_outage(Some(ProviderError::new("service_unavailable", "down", Some(503))));
        assert!(provider.get_session().await.is_err());
        assert!(provider.sign_out().await.is_err());

        provider.set_outage(None);
        assert!(provider.sign_out().await.is_ok());
    }

    #[test]
    fn metadata_keeps_unknown_fields() {
        let metadata: UserMetadata =
            serde_json::from_str(r#"{"full_name":"Demo User","school":"Lincoln"}"#).unwrap();
        assert_eq!(metadata.full_name.as_deref(), Some("Demo User"));
        assert_eq!(metadata.extra["school"], "Lincoln");
    }
}
