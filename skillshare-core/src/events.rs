use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{error::EventError, lockout::LockReason, user::UserId};

/// Reason why an account was unlocked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnlockReason {
    /// Account was unlocked via password reset
    PasswordReset,
    /// Administrator manually unlocked the account
    AdminAction,
}

impl std::fmt::Display for UnlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnlockReason::PasswordReset => write!(f, "password_reset"),
            UnlockReason::AdminAction => write!(f, "admin_action"),
        }
    }
}

/// Things worth telling the outside world about.
///
/// Security events carry the email rather than the user ID so monitoring can
/// correlate them with attempts against accounts regardless of how the
/// account is looked up.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    UserRegistered {
        user_id: UserId,
        email: String,
    },

    PasswordChanged {
        user_id: UserId,
    },

    LoginSucceeded {
        email: String,
        ip_address: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A password check failed without locking the account.
    LoginFailed {
        email: String,
        /// Consecutive failures after this attempt
        failed_attempts: u32,
        total_failed_attempts: u32,
        ip_address: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// This attempt applied a new lock. Should trigger alerts.
    AccountLocked {
        email: String,
        failed_attempts: u32,
        total_failed_attempts: u32,
        locked_until: DateTime<Utc>,
        reason: LockReason,
        ip_address: Option<String>,
        timestamp: DateTime<Utc>,
    },

    AccountUnlocked {
        email: String,
        reason: UnlockReason,
        timestamp: DateTime<Utc>,
    },

    /// An administrator cleared every failure counter.
    FailedAttemptsReset {
        email: String,
        timestamp: DateTime<Utc>,
    },
}

/// Receives every event emitted on an [`EventBus`].
///
/// ```rust,ignore
/// struct AlertOnLock;
///
/// #[async_trait]
/// impl EventHandler for AlertOnLock {
///     async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
///         if let Event::AccountLocked { email, .. } = event {
///             page_on_call(email).await;
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// A bus with [`TracingEventHandler`] already registered.
    pub fn with_tracing() -> Self {
        let handler: Arc<dyn EventHandler> = Arc::new(TracingEventHandler);
        Self {
            handlers: Arc::new(RwLock::new(vec![handler])),
        }
    }

    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers, stopping at the first error.
    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }

    /// Emit without failing the caller. Handler errors are logged.
    pub async fn publish(&self, event: Event) {
        if let Err(e) = self.emit(&event).await {
            tracing::warn!(error = %e, ?event, "Event handler failed");
        }
    }
}

/// Writes security events to the `tracing` pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventHandler;

#[async_trait]
impl EventHandler for TracingEventHandler {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
        match event {
            Event::UserRegistered { user_id, email } => {
                tracing::info!(user_id = %user_id, email = %email, "User registered");
            }
            Event::PasswordChanged { user_id } => {
                tracing::info!(user_id = %user_id, "Password changed");
            }
            Event::LoginSucceeded { email, ip_address, .. } => {
                tracing::debug!(email = %email, ip_address = ?ip_address, "Login succeeded");
            }
            Event::LoginFailed {
                email,
                failed_attempts,
                total_failed_attempts,
                ip_address,
                ..
            } => {
                tracing::warn!(
                    email = %email,
                    failed_attempts,
                    total_failed_attempts,
                    ip_address = ?ip_address,
                    "Failed login attempt"
                );
            }
            Event::AccountLocked {
                email,
                failed_attempts,
                total_failed_attempts,
                locked_until,
                reason,
                ip_address,
                ..
            } => {
                tracing::warn!(
                    email = %email,
                    failed_attempts,
                    total_failed_attempts,
                    locked_until = %locked_until,
                    reason = %reason,
                    ip_address = ?ip_address,
                    "Account locked"
                );
            }
            Event::AccountUnlocked { email, reason, .. } => {
                tracing::info!(email = %email, reason = %reason, "Account unlocked");
            }
            Event::FailedAttemptsReset { email, .. } => {
                tracing::info!(email = %email, "Failed login attempts reset");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every event it sees. Shared with service tests.
    #[derive(Default)]
    pub(crate) struct RecordingHandler {
        pub events: tokio::sync::Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
            self.events.lock().await.push(event.clone());
            Ok(())
        }
    }

    struct CountingHandler {
        call_count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ErroringEventHandler;

    #[async_trait]
    impl EventHandler for ErroringEventHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            Err(EventError::HandlerError("Test error".into()))
        }
    }

    fn unlocked_event() -> Event {
        Event::AccountUnlocked {
            email: "learner@example.com".to_string(),
            reason: UnlockReason::AdminAction,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_empty() {
        let event_bus = EventBus::default();
        event_bus
            .emit(&unlocked_event())
            .await
            .expect("Failed to emit event");
    }

    #[tokio::test]
    async fn test_event_bus_multiple_handlers() {
        let event_bus = EventBus::default();
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));

        event_bus
            .register(Arc::new(CountingHandler {
                call_count: count1.clone(),
            }))
            .await;
        event_bus
            .register(Arc::new(CountingHandler {
                call_count: count2.clone(),
            }))
            .await;

        event_bus.emit(&unlocked_event()).await.unwrap();

        assert_eq!(count1.load(Ordering::SeqCst), 1);
        assert_eq!(count2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_event_bus_error_propagation() {
        let event_bus = EventBus::default();
        event_bus.register(Arc::new(ErroringEventHandler)).await;

        let result = event_bus.emit(&unlocked_event()).await;
        assert!(matches!(result, Err(EventError::HandlerError(_))));
    }

    #[tokio::test]
    async fn test_publish_swallows_handler_errors() {
        let event_bus = EventBus::with_tracing();
        event_bus.register(Arc::new(ErroringEventHandler)).await;
        let recorder = Arc::new(RecordingHandler::default());
        event_bus.register(recorder.clone()).await;

        event_bus.publish(unlocked_event()).await;

        // Emission stops at the failing handler.
        assert!(recorder.events.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_tracing_handler_accepts_every_event() {
        let handler = TracingEventHandler;
        let now = Utc::now();
        let events = vec![
            Event::UserRegistered {
                user_id: UserId::new_random(),
                email: "a@b.io".to_string(),
            },
            Event::PasswordChanged {
                user_id: UserId::new_random(),
            },
            Event::LoginSucceeded {
                email: "a@b.io".to_string(),
                ip_address: None,
                timestamp: now,
            },
            Event::LoginFailed {
                email: "a@b.io".to_string(),
                failed_attempts: 1,
                total_failed_attempts: 1,
                ip_address: Some("127.0.0.1".to_string()),
                timestamp: now,
            },
            Event::AccountLocked {
                email: "a@b.io".to_string(),
                failed_attempts: 5,
                total_failed_attempts: 5,
                locked_until: now,
                reason: LockReason::Standard,
                ip_address: None,
                timestamp: now,
            },
            unlocked_event(),
            Event::FailedAttemptsReset {
                email: "a@b.io".to_string(),
                timestamp: now,
            },
        ];

        for event in events {
            handler.handle_event(&event).await.unwrap();
        }
    }
}
