//! Typed accessors over [`KeyValueStore`] keys.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde_json::Value;

use crate::errors::{JournalError, Result};
use crate::store::KeyValueStore;

/// Key of the viewed-journal map.
pub const VIEWED_JOURNALS_KEY: &str = "viewedJournals";
/// Key of the one-shot preview slot (session scope).
pub const JOURNAL_PREVIEW_KEY: &str = "journalPreview";
/// Key of the most recent captured image (data URL or URL).
pub const LAST_CAPTURED_IMAGE_KEY: &str = "lastCapturedImage";

const USER_NAME_KEY: &str = "userName";
const USER_PHONE_KEY: &str = "userPhone";
const USER_EMAIL_KEY: &str = "userEmail";
const USER_DOB_KEY: &str = "userDob";

/// Community journals the user has opened, stored as `{"<id>": true}`.
pub struct ViewedJournals<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> ViewedJournals<'a> {
    /// Accessor over `store`.
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    fn load(&self) -> Result<BTreeMap<String, bool>> {
        match self.store.get(VIEWED_JOURNALS_KEY)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|source| JournalError::Corrupt {
                key: VIEWED_JOURNALS_KEY.into(),
                source,
            }),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Whether `id` was opened before.
    pub fn is_viewed(&self, id: &str) -> Result<bool> {
        Ok(self.load()?.get(id).copied().unwrap_or(false))
    }

    /// Record that `id` was opened.
    pub fn mark_viewed(&self, id: &str) -> Result<()> {
        let mut map = self.load()?;
        if map.get(id) == Some(&true) {
            return Ok(());
        }
        let _ = map.insert(id.to_string(), true);
        self.store.set(VIEWED_JOURNALS_KEY, &serde_json::to_string(&map)?)
    }

    /// Ids marked viewed, sorted.
    pub fn ids(&self) -> Result<Vec<String>> {
        Ok(self
            .load()?
            .into_iter()
            .filter_map(|(id, seen)| seen.then_some(id))
            .collect())
    }
}

/// Profile fields cached during sign-up.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserProfile {
    /// Display name.
    pub name: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Date of birth, `MM/DD/YYYY`.
    pub dob: Option<String>,
}

impl UserProfile {
    /// Read whatever fields are stored.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        Ok(Self {
            name: store.get(USER_NAME_KEY)?,
            phone: store.get(USER_PHONE_KEY)?,
            email: store.get(USER_EMAIL_KEY)?,
            dob: store.get(USER_DOB_KEY)?,
        })
    }

    /// Write the fields that are set; unset fields are left untouched.
    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        let fields = [
            (USER_NAME_KEY, &self.name),
            (USER_PHONE_KEY, &self.phone),
            (USER_EMAIL_KEY, &self.email),
            (USER_DOB_KEY, &self.dob),
        ];
        for (key, value) in fields {
            if let Some(v) = value {
                store.set(key, v)?;
            }
        }
        Ok(())
    }
}

/// `MM/DD/YYYY` with missing parts defaulting to `01`, `01` and the
/// current year.
pub fn format_dob(month: Option<&str>, day: Option<&str>, year: Option<&str>) -> String {
    fn pick(part: Option<&str>) -> Option<&str> {
        part.map(str::trim).filter(|p| !p.is_empty())
    }
    let year = pick(year).map_or_else(|| chrono::Local::now().year().to_string(), str::to_owned);
    format!(
        "{}/{}/{year}",
        pick(month).unwrap_or("01"),
        pick(day).unwrap_or("01")
    )
}

/// One-shot hand-off of the generated journal from the chat screen to the
/// preview screen.
pub struct JournalPreviewSlot<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> JournalPreviewSlot<'a> {
    /// Accessor over a session-scoped store.
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    /// Store the raw journal JSON.
    pub fn put(&self, journal: &Value) -> Result<()> {
        self.store.set(JOURNAL_PREVIEW_KEY, &serde_json::to_string(journal)?)
    }

    /// Stored journal JSON, leaving it in place.
    pub fn peek(&self) -> Result<Option<Value>> {
        self.store
            .get(JOURNAL_PREVIEW_KEY)?
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|source| JournalError::Corrupt {
                    key: JOURNAL_PREVIEW_KEY.into(),
                    source,
                })
            })
            .transpose()
    }

    /// Drop the stored journal.
    pub fn clear(&self) -> Result<bool> {
        self.store.remove(JOURNAL_PREVIEW_KEY)
    }
}

/// Most recently captured image.
pub fn last_captured_image(store: &dyn KeyValueStore) -> Result<Option<String>> {
    Ok(store.get(LAST_CAPTURED_IMAGE_KEY)?.filter(|s| !s.is_empty()))
}

/// Remember `image` as the most recently captured image.
pub fn set_last_captured_image(store: &dyn KeyValueStore, image: &str) -> Result<()> {
    store.set(LAST_CAPTURED_IMAGE_KEY, image)
}
