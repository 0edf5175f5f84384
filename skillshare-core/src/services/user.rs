use std::sync::Arc;

use crate::{
    Error,
    clock::{Clock, SystemClock},
    error::{AuthError, ValidationError},
    events::{Event, EventBus},
    repositories::UserRepository,
    user::{NewUserAccount, UserAccount, UserId, normalize_email},
    validation::{validate_email, validate_name},
};

/// Service for user management operations
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            clock: Arc::new(SystemClock),
            events: EventBus::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Insert a validated account. Fails with `UserAlreadyExists` for a taken email.
    pub async fn create_user(&self, new_user: NewUserAccount) -> Result<UserAccount, Error> {
        validate_email(&new_user.email)?;
        validate_name(&new_user.name)?;

        if self.repository.find_by_email(&new_user.email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists.into());
        }

        let user = self.repository.create(&new_user, self.clock.now()).await?;

        self.events
            .publish(Event::UserRegistered {
                user_id: user.id.clone(),
                email: user.email.clone(),
            })
            .await;

        Ok(user)
    }

    /// Register an account linked to a social provider. It has no password,
    /// so the credential flow always rejects it.
    pub async fn create_social_user(
        &self,
        email: &str,
        name: &str,
        provider: &str,
        provider_id: &str,
    ) -> Result<UserAccount, Error> {
        if provider.trim().is_empty() || provider_id.trim().is_empty() {
            return Err(ValidationError::MissingField(
                "Provider and provider ID are required".to_string(),
            )
            .into());
        }

        self.create_user(NewUserAccount::with_provider(email, name, provider, provider_id))
            .await
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<UserAccount>, Error> {
        self.repository.find_by_id(user_id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, Error> {
        self.repository.find_by_email(&normalize_email(email)).await
    }
}
