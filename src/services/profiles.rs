// ProfileService - profile creation, lookup, and edits

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::core::Viewer;
use crate::error::{AppError, AppResult};
use crate::gateway::{DataGateway, Filter, Table, TableQuery};
use crate::models::profile::validate_username;
use crate::models::{NewProfile, Profile, ProfileChanges, UserId};

#[derive(Clone)]
pub struct ProfileService {
    gateway: Arc<dyn DataGateway>,
}

impl ProfileService {
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self { gateway }
    }

    /// Claims a profile for the signed-in user. The profile id is the auth
    /// user id, so each account gets exactly one.
    pub async fn create_profile(&self, viewer: &Viewer, new: NewProfile) -> AppResult<Profile> {
        let user_id = viewer.require_user()?;
        validate_username(&new.username)?;
        self.ensure_username_free(&new.username, None).await?;

        let profile = Profile {
            id: user_id,
            username: new.username,
            display_name: new.display_name,
            avatar_url: None,
            bio: None,
            is_public: new.is_public,
            onboarded: false,
            created_at: Utc::now(),
        };
        let inserted = self
            .gateway
            .insert_if_absent(Table::Profiles, profile.to_row(), &["id"])
            .await?;
        if !inserted {
            return Err(AppError::Validation(
                "Profile already exists for this account".to_string(),
            ));
        }
        info!("Created profile @{} for user {}", profile.username, user_id);
        Ok(profile)
    }

    pub async fn get_profile(&self, user_id: UserId) -> AppResult<Profile> {
        let row = self
            .gateway
            .fetch_one(TableQuery::new(Table::Profiles).eq("id", user_id.to_string()))
            .await?;
        row.as_ref()
            .and_then(Profile::from_row)
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", user_id)))
    }

    pub async fn get_by_username(&self, username: &str) -> AppResult<Profile> {
        let row = self
            .gateway
            .fetch_one(TableQuery::new(Table::Profiles).eq("username", username))
            .await?;
        row.as_ref()
            .and_then(Profile::from_row)
            .ok_or_else(|| AppError::NotFound(format!("Profile '{}' not found", username)))
    }

    /// Applies a patch to the viewer's own profile and returns the result.
    pub async fn update_profile(
        &self,
        viewer: &Viewer,
        changes: ProfileChanges,
    ) -> AppResult<Profile> {
        let user_id = viewer.require_user()?;
        if changes.is_empty() {
            return self.get_profile(user_id).await;
        }
        if let Some(username) = &changes.username {
            validate_username(username)?;
            self.ensure_username_free(username, Some(user_id)).await?;
        }

        let touched = self
            .gateway
            .update(
                Table::Profiles,
                changes.to_row(),
                vec![Filter::eq("id", user_id.to_string())],
            )
            .await?;
        if touched == 0 {
            return Err(AppError::NotFound(format!("Profile {} not found", user_id)));
        }
        self.get_profile(user_id).await
    }

    async fn ensure_username_free(&self, username: &str, owner: Option<UserId>) -> AppResult<()> {
        let existing = self
            .gateway
            .fetch_one(TableQuery::new(Table::Profiles).eq("username", username))
            .await?;
        if let Some(profile) = existing.as_ref().and_then(Profile::from_row) {
            if owner != Some(profile.id) {
                return Err(AppError::Validation(format!(
                    "Username '{}' is already taken",
                    username
                )));
            }
        }
        Ok(())
    }
}
