use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::identity::{AuthEvent, AuthResponse, IdentityProvider, ProviderError, User, UserMetadata};
use crate::router::AuthState;

pub const DEMO_USER_ID: &str = "demo-user-id";
pub const DEMO_USER_EMAIL: &str = "demo@sagereport.com";
pub const DEMO_USER_NAME: &str = "Demo User";

/// Current-user slot shared between the gate and its event follower.
///
/// Every write goes through here. Local writes first apply whatever provider
/// events are already queued, so an older event can never land after them.
struct Mirror {
    user: watch::Sender<Option<User>>,
    events: Mutex<Option<broadcast::Receiver<AuthEvent>>>,
    local_writes: AtomicU64,
}

impl Mirror {
    /// Applies queued events in order. Returns true if the receiver lagged.
    fn drain(&self, events: &mut broadcast::Receiver<AuthEvent>) -> bool {
        let mut lagged = false;
        loop {
            match events.try_recv() {
                Ok(event) => {
                    debug!(kind = ?event.kind, "session changed");
                    self.user.send_replace(event.session.map(|s| s.user));
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "missed session events");
                    lagged = true;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return lagged,
            }
        }
    }

    fn sync(&self) -> bool {
        match self.events.lock().as_mut() {
            Some(events) => self.drain(events),
            None => false,
        }
    }

    fn write_local(&self, user: Option<User>) {
        let mut events = self.events.lock();
        if let Some(events) = events.as_mut() {
            self.drain(events);
        }
        self.local_writes.fetch_add(1, Ordering::AcqRel);
        self.user.send_replace(user);
    }

    /// Re-reads the provider session after lost events. Dropped if a local
    /// write happened while the fetch was in flight.
    async fn resync(&self, provider: &dyn IdentityProvider) {
        let seen = self.local_writes.load(Ordering::Acquire);
        match provider.get_session().await {
            Ok(session) => {
                let _events = self.events.lock();
                if self.local_writes.load(Ordering::Acquire) == seen {
                    self.user.send_replace(session.map(|s| s.user));
                }
            }
            Err(error) => warn!(%error, "resynchronisation failed"),
        }
    }
}

/// Holds the current user and a loading flag for the application session.
///
/// Provider errors are returned exactly as the provider produced them.
pub struct AuthGate {
    provider: Arc<dyn IdentityProvider>,
    mirror: Arc<Mirror>,
    loading: AtomicBool,
    follower: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("user", &*self.mirror.user.borrow())
            .field("loading", &self.is_loading())
            .finish()
    }
}

impl AuthGate {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (user, _) = watch::channel(None);
        Self {
            provider,
            mirror: Arc::new(Mirror {
                user,
                events: Mutex::new(None),
                local_writes: AtomicU64::new(0),
            }),
            loading: AtomicBool::new(true),
            follower: Mutex::new(None),
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.mirror.user.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.mirror.user.borrow().is_some()
    }

    /// True until the first `initialize` call settles.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    pub fn watch(&self) -> watch::Receiver<Option<User>> {
        self.mirror.user.subscribe()
    }

    /// Loads the provider's current session and starts following its
    /// session-change stream. The loading flag is cleared either way.
    pub async fn initialize(&self) -> Result<(), ProviderError> {
        // Subscribe before fetching so no change in between is lost.
        let events = self.provider.subscribe();
        let wake = self.provider.subscribe();
        let result = self.provider.get_session().await;
        let outcome = match result {
            Ok(session) => {
                let user = session.map(|s| s.user);
                debug!(signed_in = user.is_some(), "session restored");
                *self.mirror.events.lock() = Some(events);
                self.mirror.write_local(user);
                self.follow(wake);
                Ok(())
            }
            Err(error) => {
                warn!(code = %error.code, %error, "failed to load session");
                Err(error)
            }
        };
        self.loading.store(false, Ordering::Release);
        outcome
    }

    fn follow(&self, mut wake: broadcast::Receiver<AuthEvent>) {
        let mirror = Arc::clone(&self.mirror);
        let provider = Arc::clone(&self.provider);
        let handle = tokio::spawn(async move {
            loop {
                match wake.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => {
                        if mirror.sync() {
                            mirror.resync(provider.as_ref()).await;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        if let Some(previous) = self.follower.lock().replace(handle) {
            previous.abort();
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, ProviderError> {
        let response = self
            .provider
            .sign_in_with_password(email, password)
            .await
            .inspect_err(|error| warn!(code = %error.code, %error, "sign-in rejected"))?;
        self.mirror.write_local(response.user.clone());
        info!(user_id = response.user.as_ref().map(|u| u.id.as_str()), "signed in");
        Ok(response)
    }

    /// Creates an account. The local session is left as it was.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<AuthResponse, ProviderError> {
        let response = self
            .provider
            .sign_up(email, password, UserMetadata::full_name(full_name))
            .await
            .inspect_err(|error| warn!(code = %error.code, %error, "sign-up rejected"))?;
        info!(user_id = response.user.as_ref().map(|u| u.id.as_str()), "account created");
        Ok(response)
    }

    /// Ends the provider session. The local user is kept if the provider fails.
    pub async fn sign_out(&self) -> Result<(), ProviderError> {
        self.provider
            .sign_out()
            .await
            .inspect_err(|error| warn!(code = %error.code, %error, "sign-out failed"))?;
        self.mirror.write_local(None);
        info!("signed out");
        Ok(())
    }

    /// Signs in a fixed local user without contacting the provider.
    pub fn demo_sign_in(&self) -> User {
        let user = User {
            id: DEMO_USER_ID.to_string(),
            email: Some(DEMO_USER_EMAIL.to_string()),
            user_metadata: UserMetadata::full_name(DEMO_USER_NAME),
            aud: "authenticated".to_string(),
            created_at: Utc::now(),
        };
        self.mirror.write_local(Some(user.clone()));
        info!(user_id = DEMO_USER_ID, "demo sign-in");
        user
    }
}

impl AuthState for AuthGate {
    fn is_authenticated(&self) -> bool {
        AuthGate::is_authenticated(self)
    }
}

impl Drop for AuthGate {
    fn drop(&mut self) {
        if let Some(handle) = self.follower.get_mut().take() {
            handle.abort();
        }
    }
}
