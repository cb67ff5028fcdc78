//! Domain services for the CTF portal.
//!
//! Services contain business rules that operate on domain models.

pub mod eligibility;
pub mod lockout;

pub use eligibility::{check_eligibility, RegistrationRejection};
pub use lockout::LockoutPolicy;
