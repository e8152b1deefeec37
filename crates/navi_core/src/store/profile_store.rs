//! User profile documents (`users/{uid}`).
//!
//! Profiles are read on demand rather than mirrored; preferences change
//! rarely and are cached by the session.

use super::{StoreError, StoreResult};
use crate::backend::{field, to_fields, BackendError, DocumentPath, DocumentStore};
use crate::model::profile::{NewUserProfile, PreferencesPatch, UserPreferences, UserProfile};
use chrono::{DateTime, Utc};
use log::info;
use std::sync::Arc;

pub struct ProfileStore {
    backend: Arc<dyn DocumentStore>,
}

impl ProfileStore {
    pub fn new(backend: Arc<dyn DocumentStore>) -> Self {
        Self { backend }
    }

    /// Writes a fresh profile. An existing profile is left untouched and
    /// reported as `ProfileExists`.
    pub fn create_profile(
        &self,
        user_id: &str,
        email: &str,
        created_at: DateTime<Utc>,
        preferences: &UserPreferences,
    ) -> StoreResult<UserProfile> {
        let path = DocumentPath::profile(user_id);
        if self.backend.get_document(&path)?.is_some() {
            return Err(StoreError::ProfileExists(user_id.to_string()));
        }
        let body = NewUserProfile {
            email,
            created_at,
            preferences,
        };
        self.backend.set_document(&path, to_fields(&body)?)?;
        info!("event=profile_create module=store status=ok user_id={user_id}");
        Ok(UserProfile {
            id: user_id.to_string(),
            email: email.to_string(),
            created_at,
            preferences: preferences.clone(),
        })
    }

    pub fn load_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        let doc = self.backend.get_document(&DocumentPath::profile(user_id))?;
        Ok(doc.map(|doc| doc.decode()).transpose()?)
    }

    /// Merges `patch` over the stored preferences and returns the result.
    pub fn update_preferences(
        &self,
        user_id: &str,
        patch: PreferencesPatch,
    ) -> StoreResult<UserPreferences> {
        let patch = patch.validated()?;
        let profile = self
            .load_profile(user_id)?
            .ok_or_else(|| StoreError::ProfileNotFound(user_id.to_string()))?;
        let merged = patch.apply_to(&profile.preferences);
        if merged == profile.preferences {
            return Ok(merged);
        }

        let value = serde_json::to_value(&merged).map_err(BackendError::from)?;
        self.backend
            .update_document(&DocumentPath::profile(user_id), field("preferences", value))?;
        info!(
            "event=preferences_update module=store status=ok user_id={} timezone={} reset_time={}",
            user_id, merged.timezone, merged.reset_time
        );
        Ok(merged)
    }
}
