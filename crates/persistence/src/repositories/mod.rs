//! Repository implementations for database operations.

pub mod activity;
pub mod competition;
pub mod failed_login;
pub mod password_reset;
pub mod registration;
pub mod remember_token;
pub mod user;
pub mod web_session;

pub use activity::ActivityRepository;
pub use competition::CompetitionRepository;
pub use failed_login::FailedLoginRepository;
pub use password_reset::PasswordResetRepository;
pub use registration::RegistrationRepository;
pub use remember_token::RememberTokenRepository;
pub use user::{NewUser, ProfileChanges, UserRepository};
pub use web_session::WebSessionRepository;
