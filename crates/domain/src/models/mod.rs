//! Domain models for the CTF portal.

pub mod activity;
pub mod competition;
pub mod registration;
pub mod user;

pub use activity::{Activity, ActivityKind, ActivityView};
pub use competition::{
    Competition, CompetitionStatus, CompetitionView, DifficultyLevel, Schedule, ScheduleError,
};
pub use registration::{
    MyRegistration, PaymentStatus, Registration, RegistrationDetail, RegistrationStatus,
};
pub use user::{User, UserProfile, UserRole};
