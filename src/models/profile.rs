// Profile - account identity and visibility, backed by the profiles collection

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::gateway::JsonRow;
use crate::models::decode;
use crate::models::UserId;

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_.]{3,24}$").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    /// Public accounts accept followers immediately; private ones queue requests.
    pub is_public: bool,
    pub onboarded: bool,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Decodes a gateway row. Rows missing the identity fields are not
    /// representable as profiles and decode to `None`.
    pub fn from_row(row: &JsonRow) -> Option<Self> {
        Some(Profile {
            id: decode::uuid_field(row, "id")?,
            username: decode::string_field(row, "username")?,
            display_name: decode::string_field(row, "display_name"),
            avatar_url: decode::string_field(row, "avatar_url"),
            bio: decode::string_field(row, "bio"),
            is_public: decode::bool_field(row, "is_public").unwrap_or(true),
            onboarded: decode::bool_field(row, "onboarded").unwrap_or(false),
            created_at: decode::datetime_field(row, "created_at")?,
        })
    }

    pub fn to_row(&self) -> JsonRow {
        decode::row_from_value(json!({
            "id": self.id.to_string(),
            "username": self.username,
            "display_name": self.display_name,
            "avatar_url": self.avatar_url,
            "bio": self.bio,
            "is_public": self.is_public,
            "onboarded": self.onboarded,
            "created_at": decode::format_timestamp(self.created_at),
        }))
    }
}

/// Request payload for claiming a profile at signup.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProfile {
    pub username: String,
    pub display_name: Option<String>,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}

/// Patch payload for profile edits; absent fields stay untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileChanges {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub is_public: Option<bool>,
    pub onboarded: Option<bool>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.display_name.is_none()
            && self.avatar_url.is_none()
            && self.bio.is_none()
            && self.is_public.is_none()
            && self.onboarded.is_none()
    }

    /// The partial row this patch writes.
    pub fn to_row(&self) -> JsonRow {
        let mut row = JsonRow::new();
        if let Some(username) = &self.username {
            row.insert("username".to_string(), json!(username));
        }
        if let Some(display_name) = &self.display_name {
            row.insert("display_name".to_string(), json!(display_name));
        }
        if let Some(avatar_url) = &self.avatar_url {
            row.insert("avatar_url".to_string(), json!(avatar_url));
        }
        if let Some(bio) = &self.bio {
            row.insert("bio".to_string(), json!(bio));
        }
        if let Some(is_public) = self.is_public {
            row.insert("is_public".to_string(), json!(is_public));
        }
        if let Some(onboarded) = self.onboarded {
            row.insert("onboarded".to_string(), json!(onboarded));
        }
        row
    }
}

/// Usernames are lowercase handles: letters, digits, underscore, dot,
/// between 3 and 24 characters.
pub fn validate_username(username: &str) -> AppResult<()> {
    if USERNAME_PATTERN.is_match(username) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Invalid username '{}': use 3-24 lowercase letters, digits, '_' or '.'",
            username
        )))
    }
}
