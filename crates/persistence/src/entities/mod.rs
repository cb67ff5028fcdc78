//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod activity;
pub mod competition;
pub mod registration;
pub mod session;
pub mod user;

pub use activity::ActivityEntity;
pub use competition::{
    CompetitionChanges, CompetitionEntity, CompetitionWithCountEntity, NewCompetition,
};
pub use registration::{MyRegistrationEntity, RegistrationDetailEntity, RegistrationEntity};
pub use session::{PasswordResetEntity, RememberTokenEntity, WebSessionEntity};
pub use user::{ImageBlobEntity, UserEntity};
