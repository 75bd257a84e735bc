use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::models::Applicant;
use crate::storage::{StorageError, TokenStorage, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};

/// Everything the views observe. Readers always see the last write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub applicants: Vec<Applicant>,
    pub current_applicant: Option<Applicant>,
    pub is_loading: bool,
    pub last_error: Option<String>,
    /// Set after a successful public submission; gates the success page.
    pub has_just_submitted: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Session tokens, the loaded applicants, and UI status.
///
/// Mutations are synchronous and last-writer-wins. Token changes are applied in
/// memory first and then mirrored to [`TokenStorage`] by [`SessionStore::sync_tokens`];
/// a storage failure never rolls back the in-memory state.
pub struct SessionStore {
    state: watch::Sender<SessionState>,
    storage: Arc<dyn TokenStorage>,
}

impl SessionStore {
    /// Builds the store, restoring any tokens a previous run persisted.
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        let initial = SessionState {
            access_token: read_slot(storage.as_ref(), ACCESS_TOKEN_KEY),
            refresh_token: read_slot(storage.as_ref(), REFRESH_TOKEN_KEY),
            ..SessionState::default()
        };
        if initial.is_authenticated() {
            debug!("restored persisted session");
        }

        let (state, _) = watch::channel(initial);
        Self { state, storage }
    }

    /// Change notifications; every mutation marks the receiver as changed.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.state.borrow().refresh_token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.borrow().last_error.clone()
    }

    pub fn applicants(&self) -> Vec<Applicant> {
        self.state.borrow().applicants.clone()
    }

    pub fn current_applicant(&self) -> Option<Applicant> {
        self.state.borrow().current_applicant.clone()
    }

    pub fn has_just_submitted(&self) -> bool {
        self.state.borrow().has_just_submitted
    }

    pub fn set_tokens(
        &self,
        access: Option<String>,
        refresh: Option<String>,
    ) -> Result<(), StorageError> {
        self.state.send_modify(|state| {
            state.access_token = access;
            state.refresh_token = refresh;
        });
        self.sync_tokens()
    }

    /// Mirrors the in-memory tokens into storage: present values are written,
    /// absent ones removed. Both slots are attempted; the first error is returned.
    pub fn sync_tokens(&self) -> Result<(), StorageError> {
        let (access, refresh) = {
            let state = self.state.borrow();
            (state.access_token.clone(), state.refresh_token.clone())
        };
        let access_synced = self.sync_slot(ACCESS_TOKEN_KEY, access.as_deref());
        let refresh_synced = self.sync_slot(REFRESH_TOKEN_KEY, refresh.as_deref());
        access_synced.and(refresh_synced)
    }

    fn sync_slot(&self, key: &str, value: Option<&str>) -> Result<(), StorageError> {
        match value {
            Some(value) => self.storage.set(key, value),
            None => self.storage.remove(key),
        }
    }

    /// Drops the session and all applicant data. UI status is left alone.
    ///
    /// The applicant data is cleared even when erasing the persisted tokens fails.
    pub fn clear_auth(&self) -> Result<(), StorageError> {
        let synced = self.set_tokens(None, None);
        self.state.send_modify(|state| {
            state.applicants.clear();
            state.current_applicant = None;
        });
        synced
    }

    pub fn set_applicants(&self, applicants: Vec<Applicant>) {
        self.state.send_modify(|state| state.applicants = applicants);
    }

    pub fn set_current_applicant(&self, applicant: Option<Applicant>) {
        self.state
            .send_modify(|state| state.current_applicant = applicant);
    }

    /// Replaces the list entry with the same id, then keeps the current applicant
    /// in step with it. An id missing from the list leaves the list untouched.
    pub fn update_applicant_in_list(&self, updated: Applicant) {
        let Some(id) = updated.id() else {
            warn!("updated applicant carries no id; dropping update");
            return;
        };

        let mut replaced = false;
        self.state.send_modify(|state| {
            if let Some(slot) = state.applicants.iter_mut().find(|a| a.has_id(&id)) {
                *slot = updated.clone();
                replaced = true;
            }
            if state
                .current_applicant
                .as_ref()
                .is_some_and(|current| current.has_id(&id))
            {
                state.current_applicant = Some(updated);
            }
        });

        if !replaced {
            // Possible lost update: the list stays stale until the next full fetch.
            warn!(applicant_id = %id, "updated applicant not in loaded list");
        }
    }

    /// Lookup in the loaded list only; never fetches.
    pub fn get_applicant_by_id(&self, id: &str) -> Option<Applicant> {
        self.state
            .borrow()
            .applicants
            .iter()
            .find(|a| a.has_id(id))
            .cloned()
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_modify(|state| state.is_loading = loading);
    }

    pub fn set_error(&self, error: Option<String>) {
        self.state.send_modify(|state| state.last_error = error);
    }

    pub fn clear_error(&self) {
        self.set_error(None);
    }

    pub fn set_has_just_submitted(&self, submitted: bool) {
        self.state
            .send_modify(|state| state.has_just_submitted = submitted);
    }
}

fn read_slot(storage: &dyn TokenStorage, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value,
        Err(error) => {
            warn!(%error, key, "could not read persisted token; starting signed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FailingStorage, FileStorage, MemoryStorage};
    use serde_json::json;

    fn applicant(id: &str, status: &str) -> Applicant {
        serde_json::from_value(json!({ "id": id, "status": status })).unwrap()
    }

    fn store_with(storage: Arc<MemoryStorage>) -> SessionStore {
        SessionStore::new(storage)
    }

    #[test]
    fn test_new_restores_persisted_tokens() {
        let storage = Arc::new(MemoryStorage::with_tokens("acc", "ref"));
        let store = store_with(storage);

        assert!(store.is_authenticated());
        assert_eq!(store.access_token().as_deref(), Some("acc"));
        assert_eq!(store.refresh_token().as_deref(), Some("ref"));
    }

    #[test]
    fn test_new_without_tokens_is_signed_out() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        assert!(!store.is_authenticated());
        assert!(!store.is_loading());
        assert_eq!(store.last_error(), None);
    }

    #[test]
    fn test_set_tokens_mirrors_and_removes() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone());

        store
            .set_tokens(Some("a1".to_string()), Some("r1".to_string()))
            .unwrap();
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a1"));
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));

        store.set_tokens(Some("a2".to_string()), None).unwrap();
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a2"));
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap(), None);
        assert!(store.is_authenticated());
    }

    #[test]
    fn test_authenticated_tracks_access_token_only() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        store.set_tokens(None, Some("r".to_string())).unwrap();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_clear_auth_wipes_session_but_not_ui_status() {
        let storage = Arc::new(MemoryStorage::with_tokens("acc", "ref"));
        let store = store_with(storage.clone());
        store.set_applicants(vec![applicant("1", "beworben")]);
        store.set_current_applicant(Some(applicant("1", "beworben")));
        store.set_error(Some("boom".to_string()));
        store.set_loading(true);

        store.clear_auth().unwrap();

        assert!(!store.is_authenticated());
        assert_eq!(store.refresh_token(), None);
        assert!(store.applicants().is_empty());
        assert_eq!(store.current_applicant(), None);
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).unwrap(), None);
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap(), None);
        assert_eq!(store.last_error().as_deref(), Some("boom"));
        assert!(store.is_loading());
    }

    #[test]
    fn test_update_syncs_matching_current_applicant() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        store.set_applicants(vec![applicant("1", "beworben"), applicant("2", "beworben")]);
        store.set_current_applicant(Some(applicant("2", "beworben")));

        let updated = applicant("2", "eingestellt");
        store.update_applicant_in_list(updated.clone());

        assert_eq!(store.applicants()[1], updated);
        assert_eq!(store.current_applicant(), Some(updated));
        assert_eq!(store.applicants()[0], applicant("1", "beworben"));
    }

    #[test]
    fn test_update_leaves_non_matching_current_applicant() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        store.set_applicants(vec![applicant("1", "beworben"), applicant("2", "beworben")]);
        store.set_current_applicant(Some(applicant("2", "beworben")));

        store.update_applicant_in_list(applicant("1", "abgelehnt"));

        assert_eq!(store.current_applicant(), Some(applicant("2", "beworben")));
        assert_eq!(store.applicants()[0], applicant("1", "abgelehnt"));
    }

    #[test]
    fn test_update_for_unlisted_id_still_syncs_current() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        store.set_applicants(vec![applicant("1", "beworben")]);
        store.set_current_applicant(Some(applicant("9", "beworben")));

        store.update_applicant_in_list(applicant("9", "geprueft"));

        assert_eq!(store.applicants(), vec![applicant("1", "beworben")]);
        assert_eq!(store.current_applicant(), Some(applicant("9", "geprueft")));
    }

    #[test]
    fn test_get_applicant_by_id_reads_loaded_list() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        store.set_applicants(vec![
            serde_json::from_value(json!({ "id": 12, "status": "beworben" })).unwrap(),
        ]);

        assert!(store.get_applicant_by_id("12").is_some());
        assert!(store.get_applicant_by_id("13").is_none());
    }

    #[test]
    fn test_subscribers_see_last_write() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        let mut rx = store.subscribe();

        store.set_loading(true);
        store.set_error(Some("first".to_string()));
        store.set_error(Some("second".to_string()));

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert!(seen.is_loading);
        assert_eq!(seen.last_error.as_deref(), Some("second"));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_error_and_submission_flags() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        store.set_error(Some("x".to_string()));
        store.clear_error();
        assert_eq!(store.last_error(), None);

        store.set_has_just_submitted(true);
        assert!(store.has_just_submitted());
    }

    #[test]
    fn test_unreadable_storage_starts_signed_out() {
        let store = SessionStore::new(Arc::new(FailingStorage));
        assert!(!store.is_authenticated());
        assert_eq!(store.refresh_token(), None);
    }

    #[test]
    fn test_tokens_kept_in_memory_when_persisting_fails() {
        let store = SessionStore::new(Arc::new(FailingStorage));

        let result = store.set_tokens(Some("acc".to_string()), Some("ref".to_string()));

        assert!(matches!(result, Err(StorageError::Io { .. })));
        assert!(store.is_authenticated());
        assert_eq!(store.refresh_token().as_deref(), Some("ref"));
    }

    #[test]
    fn test_clear_auth_signs_out_when_erasing_fails() {
        let store = SessionStore::new(Arc::new(FailingStorage));
        store
            .set_tokens(Some("acc".to_string()), Some("ref".to_string()))
            .unwrap_err();
        store.set_applicants(vec![applicant("1", "beworben")]);
        store.set_current_applicant(Some(applicant("1", "beworben")));

        assert!(store.clear_auth().is_err());

        assert!(!store.is_authenticated());
        assert_eq!(store.refresh_token(), None);
        assert!(store.applicants().is_empty());
        assert_eq!(store.current_applicant(), None);
    }

    #[test]
    fn test_session_recovers_from_corrupt_token_file() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let path = tmp.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SessionStore::new(Arc::new(FileStorage::new(&path)));
        assert!(!store.is_authenticated());
        store
            .set_tokens(Some("acc".to_string()), Some("ref".to_string()))
            .unwrap();

        let restarted = SessionStore::new(Arc::new(FileStorage::new(&path)));
        assert!(restarted.is_authenticated());
        assert_eq!(restarted.refresh_token().as_deref(), Some("ref"));

        restarted.clear_auth().unwrap();
        assert!(!path.exists());
    }
}
