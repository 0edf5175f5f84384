//! Repository traits for the data access layer
//!
//! Services talk to storage only through these traits.
//!
//! # Trait Hierarchy
//!
//! - `*Repository` traits define the operations for each data domain
//! - `*RepositoryProvider` traits hand out a repository of each kind
//! - [`RepositoryProvider`] combines the providers with lifecycle methods
//! - The adapters in [`adapter`] expose one provider as the individual
//!   repositories the services are generic over

pub mod adapter;
pub mod reset_token;
pub mod user;

pub use adapter::{ResetTokenRepositoryAdapter, UserRepositoryAdapter};
pub use reset_token::ResetTokenRepository;
pub use user::UserRepository;

use async_trait::async_trait;

use crate::Error;

pub trait UserRepositoryProvider: Send + Sync + 'static {
    type UserRepo: UserRepository;

    fn user(&self) -> &Self::UserRepo;
}

pub trait ResetTokenRepositoryProvider: Send + Sync + 'static {
    type ResetTokenRepo: ResetTokenRepository;

    fn reset_token(&self) -> &Self::ResetTokenRepo;
}

/// Everything a storage backend has to supply.
///
/// ```rust,ignore
/// use skillshare_core::repositories::*;
///
/// struct MyStorage { users: MyUserRepository, tokens: MyTokenRepository }
///
/// impl UserRepositoryProvider for MyStorage {
///     type UserRepo = MyUserRepository;
///     fn user(&self) -> &Self::UserRepo { &self.users }
/// }
///
/// // ... ResetTokenRepositoryProvider ...
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider: UserRepositoryProvider + ResetTokenRepositoryProvider {
    /// Run pending schema migrations
    async fn migrate(&self) -> Result<(), Error>;

    /// Check that the backing store is reachable
    async fn health_check(&self) -> Result<(), Error>;
}
