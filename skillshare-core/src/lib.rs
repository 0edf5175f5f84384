//! Core functionality for SkillShare authentication
//!
//! This crate holds the domain model and business rules; storage backends and
//! transports live in sibling crates.
//!
//! - [`lockout`]: the account lockout policy engine, pure functions over a [`UserAccount`]
//! - [`services`]: registration, login, password reset and admin lockout operations
//! - [`repositories`]: the storage traits a backend implements
//! - [`session`]: JWT issuance and verification
//!
//! Time always comes from an injected [`Clock`], never from the system directly,
//! so every decision can be replayed in tests.
pub mod clock;
pub mod crypto;
pub mod error;
pub mod events;
pub mod id;
pub mod lockout;
pub mod repositories;
pub mod services;
pub mod session;
pub mod token;
pub mod user;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::Error;
pub use events::{Event, EventBus, EventHandler, UnlockReason};
pub use lockout::{AttemptOutcome, LockReason, LockoutConfig, LockoutInfo, Rejection};
pub use session::{Claims, JwtConfig, Role, SessionIssuer, SessionToken};
pub use token::PasswordResetToken;
pub use user::{NewUserAccount, UserAccount, UserId};
