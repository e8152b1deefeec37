//! Signed-in user lifecycle.
//!
//! # Responsibility
//! - Create the profile on sign-up and load preferences on sign-in.
//! - Attach all three store listeners for the signed-in user and detach
//!   them on sign-out.
//! - Answer "what day is it" for the user's zone and reset time.
//!
//! # Invariants
//! - At most one user is signed in; signing in someone else signs the
//!   previous user out first.
//! - After sign-out every store is back to its initial state, so nothing
//!   from one user is visible to the next.

use crate::backend::DocumentStore;
use crate::calendar::{CalendarContext, Clock, Zone};
use crate::model::profile::{PreferencesPatch, UserPreferences, UserProfile};
use crate::observe::{lock, Subscription};
use crate::store::{ActiveStore, ListStore, NotesStore, ProfileStore, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

/// Identity handed over by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

impl AuthUser {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

#[derive(Debug)]
pub enum SessionError {
    NotSignedIn,
    Store(StoreError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSignedIn => write!(f, "no user is signed in"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::NotSignedIn => None,
        }
    }
}

impl From<StoreError> for SessionError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

#[derive(Default)]
struct SignedIn {
    user: Option<AuthUser>,
    preferences: Option<UserPreferences>,
    subscriptions: Vec<Subscription>,
}

pub struct Session {
    clock: Arc<dyn Clock>,
    zone_override: Option<Zone>,
    lists: ListStore,
    active: ActiveStore,
    notes: NotesStore,
    profiles: ProfileStore,
    signed_in: Mutex<SignedIn>,
}

impl Session {
    pub fn new(backend: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            lists: ListStore::new(Arc::clone(&backend)),
            active: ActiveStore::new(Arc::clone(&backend), Arc::clone(&clock)),
            notes: NotesStore::new(Arc::clone(&backend)),
            profiles: ProfileStore::new(backend),
            clock,
            zone_override: None,
            signed_in: Mutex::new(SignedIn::default()),
        }
    }

    /// Forces calendar dates into `zone` regardless of stored preferences.
    pub fn with_zone_override(mut self, zone: Zone) -> Self {
        self.zone_override = Some(zone);
        self
    }

    pub fn lists(&self) -> &ListStore {
        &self.lists
    }

    pub fn active(&self) -> &ActiveStore {
        &self.active
    }

    pub fn notes(&self) -> &NotesStore {
        &self.notes
    }

    /// Registers a new account: writes the profile with default
    /// preferences, then signs the user in.
    pub fn sign_up(&self, user: AuthUser) -> Result<UserProfile, SessionError> {
        let preferences = UserPreferences::default();
        let profile =
            self.profiles
                .create_profile(&user.id, &user.email, self.clock.now(), &preferences)?;
        info!(
            "event=sign_up module=session status=ok user_id={} timezone={}",
            user.id, preferences.timezone
        );
        self.sign_in(user)?;
        Ok(profile)
    }

    /// Loads preferences and attaches every store for `user`.
    pub fn sign_in(&self, user: AuthUser) -> Result<(), SessionError> {
        if self.current_user().is_some() {
            self.sign_out();
        }

        let preferences = match self.profiles.load_profile(&user.id)? {
            Some(profile) => profile.preferences,
            None => {
                warn!(
                    "event=sign_in module=session status=degraded user_id={} reason=profile_missing",
                    user.id
                );
                UserPreferences::default()
            }
        };

        let subscriptions = match self.attach_stores(&user.id) {
            Ok(subscriptions) => subscriptions,
            Err(err) => {
                self.reset_stores();
                return Err(err.into());
            }
        };

        info!("event=sign_in module=session status=ok user_id={}", user.id);
        let mut signed_in = lock(&self.signed_in);
        *signed_in = SignedIn {
            user: Some(user),
            preferences: Some(preferences),
            subscriptions,
        };
        Ok(())
    }

    fn attach_stores(&self, user_id: &str) -> Result<Vec<Subscription>, StoreError> {
        Ok(vec![
            self.lists.subscribe(user_id)?,
            self.active.subscribe(user_id)?,
            self.notes.subscribe(user_id)?,
        ])
    }

    fn reset_stores(&self) {
        self.lists.reset();
        self.active.reset();
        self.notes.reset();
    }

    /// Detaches every listener and clears local state.
    pub fn sign_out(&self) {
        let previous = std::mem::take(&mut *lock(&self.signed_in));
        let user_id = previous.user.map(|user| user.id);
        drop(previous.subscriptions);
        self.reset_stores();
        if let Some(user_id) = user_id {
            info!("event=sign_out module=session status=ok user_id={user_id}");
        }
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        lock(&self.signed_in).user.clone()
    }

    pub fn is_signed_in(&self) -> bool {
        lock(&self.signed_in).user.is_some()
    }

    pub(crate) fn require_user(&self) -> Result<AuthUser, SessionError> {
        self.current_user().ok_or(SessionError::NotSignedIn)
    }

    /// Preferences of the signed-in user, or defaults when signed out.
    pub fn preferences(&self) -> UserPreferences {
        lock(&self.signed_in)
            .preferences
            .clone()
            .unwrap_or_default()
    }

    pub fn update_preferences(
        &self,
        patch: PreferencesPatch,
    ) -> Result<UserPreferences, SessionError> {
        let user = self.require_user()?;
        let merged = self.profiles.update_preferences(&user.id, patch)?;
        let mut signed_in = lock(&self.signed_in);
        if signed_in.user.as_ref() == Some(&user) {
            signed_in.preferences = Some(merged.clone());
        }
        Ok(merged)
    }

    pub fn calendar(&self) -> CalendarContext {
        let preferences = lock(&self.signed_in).preferences.clone();
        let context = CalendarContext::from_preferences(preferences.as_ref());
        match self.zone_override {
            Some(zone) => context.with_zone(zone),
            None => context,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Calendar date of "now" for the signed-in user.
    pub fn today(&self) -> NaiveDate {
        self.calendar().date_of(self.clock.now())
    }
}
