//! User activity feed models.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Kinds of events written to the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Signup,
    Signin,
    PasswordResetRequested,
    PasswordResetCompleted,
    ProfileUpdate,
    PasswordChange,
    AvatarUpdate,
    CompetitionRegister,
    AdminCompetitionCreate,
    AdminCompetitionUpdate,
    AdminCompetitionDelete,
    AdminPaymentUpdate,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Signup => "auth.signup",
            ActivityKind::Signin => "auth.signin",
            ActivityKind::PasswordResetRequested => "auth.password_reset_requested",
            ActivityKind::PasswordResetCompleted => "auth.password_reset_completed",
            ActivityKind::ProfileUpdate => "profile.update",
            ActivityKind::PasswordChange => "profile.password.change",
            ActivityKind::AvatarUpdate => "profile.avatar.update",
            ActivityKind::CompetitionRegister => "competition.register",
            ActivityKind::AdminCompetitionCreate => "admin.competition.create",
            ActivityKind::AdminCompetitionUpdate => "admin.competition.update",
            ActivityKind::AdminCompetitionDelete => "admin.competition.delete",
            ActivityKind::AdminPaymentUpdate => "admin.payment.update",
        }
    }

    /// Human readable default description.
    pub fn description(&self) -> &'static str {
        match self {
            ActivityKind::Signup => "Account created",
            ActivityKind::Signin => "User signed in",
            ActivityKind::PasswordResetRequested => "Password reset email sent",
            ActivityKind::PasswordResetCompleted => "Password was reset successfully",
            ActivityKind::ProfileUpdate => "Updated profile information",
            ActivityKind::PasswordChange => "Changed account password",
            ActivityKind::AvatarUpdate => "Updated profile avatar",
            ActivityKind::CompetitionRegister => "Registered for competition",
            ActivityKind::AdminCompetitionCreate => "Created competition",
            ActivityKind::AdminCompetitionUpdate => "Updated competition",
            ActivityKind::AdminCompetitionDelete => "Deleted competition",
            ActivityKind::AdminPaymentUpdate => "Updated registration payment status",
        }
    }
}

/// A stored activity entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: i64,
    pub user_id: i32,
    pub activity_type: String,
    pub description: String,
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

/// Activity as rendered in the feed, with the timestamp shown in the
/// application offset and as epoch milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityView {
    pub id: i64,
    pub activity_type: String,
    pub description: String,
    pub metadata: Option<JsonValue>,
    pub created_at: String,
    pub created_at_epoch_ms: i64,
}

impl ActivityView {
    pub fn new(activity: Activity, offset: FixedOffset) -> Self {
        let metadata = activity.metadata.filter(|m| m.is_object() || m.is_array());
        Self {
            id: activity.id,
            activity_type: activity.activity_type,
            description: activity.description,
            metadata,
            created_at: activity.created_at.with_timezone(&offset).to_rfc3339(),
            created_at_epoch_ms: activity.created_at.timestamp() * 1000,
        }
    }
}
