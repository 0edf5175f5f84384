//! Service layer for business logic
//!
//! Services are generic over the repository traits and hold them in `Arc`s,
//! so one storage backend instance can be shared by all of them.

pub mod lockout;
pub mod password;
pub mod password_reset;
pub mod user;

#[cfg(test)]
pub(crate) mod mock;

pub use lockout::{AccountLockoutStatus, AttemptRecord, LockoutService};
pub use password::PasswordService;
pub use password_reset::{LogResetTokenSender, PasswordResetService, ResetTokenSender};
pub use user::UserService;
