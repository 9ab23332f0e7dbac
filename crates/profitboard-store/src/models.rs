//! Store-specific row shapes that have no home in `profitboard-shared`.

use serde::{Deserialize, Serialize};

use profitboard_shared::Profile;

/// Owner-editable profile fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub discord: String,
    /// `None` keeps whatever avatar is already stored.
    pub avatar_url: Option<String>,
}

/// A profile plus the number of its approved submissions, for the admin
/// user list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    #[serde(flatten)]
    pub profile: Profile,
    pub submission_count: i64,
}
