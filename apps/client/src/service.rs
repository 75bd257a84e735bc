//! ApplicantService: the operations the views call.
//!
//! Every operation follows the same shape: raise the loading flag, call the
//! transport, write the outcome into the [`SessionStore`], normalize any failure
//! into `last_error`, lower the loading flag. Nothing is returned as `Err`; callers
//! get a `bool` (or nothing) and read details from the store.
//!
//! The loading flag is lowered by a drop guard, so it also comes down when a
//! caller abandons the future mid-flight.
//!
//! No two calls are serialized against each other. Overlapping calls simply
//! write the store in completion order.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::errors::{
    self, ErrorContext, LOAD_APPLICANTS_FAILED, LOAD_DETAILS_FAILED, SAVE_FAILED,
};
use crate::models::{ApplicantPatch, ApplicationForm, Credentials, TokenPair};
use crate::routes::{Navigator, Route};
use crate::state::SessionStore;
use crate::transport::{ApplicantTransport, TransportError};

#[derive(Clone)]
pub struct ApplicantService {
    store: Arc<SessionStore>,
    transport: Arc<dyn ApplicantTransport>,
    navigator: Arc<dyn Navigator>,
}

/// Holds `is_loading` up for as long as it lives.
struct LoadingGuard<'a> {
    store: &'a SessionStore,
}

impl<'a> LoadingGuard<'a> {
    fn start(store: &'a SessionStore) -> Self {
        store.set_loading(true);
        Self { store }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.set_loading(false);
    }
}

impl ApplicantService {
    pub fn new(
        store: Arc<SessionStore>,
        transport: Arc<dyn ApplicantTransport>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            store,
            transport,
            navigator,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Exchanges credentials for a token pair.
    ///
    /// A response without an access token counts as a failure even when the
    /// transport call itself succeeded.
    pub async fn login(&self, credentials: &Credentials) -> bool {
        let _loading = LoadingGuard::start(&self.store);
        self.store.clear_error();

        let failure = match self.transport.login(credentials).await {
            Ok(TokenPair {
                access: Some(access),
                refresh,
            }) if !access.is_empty() => {
                let refresh = refresh.filter(|r| !r.is_empty());
                if let Err(error) = self.store.set_tokens(Some(access), refresh) {
                    warn!(%error, "session not persisted; it will not survive a restart");
                }
                info!(username = %credentials.username, "login succeeded");
                return true;
            }
            Ok(_) => {
                error!(username = %credentials.username, "login response carried no access token");
                None
            }
            Err(err) => {
                error!(username = %credentials.username, error = %err, "login failed");
                Some(err)
            }
        };

        let body = failure.as_ref().and_then(TransportError::body);
        self.store
            .set_error(Some(errors::normalize(body, ErrorContext::Login)));
        false
    }

    /// Ends the session. Cannot fail: local state is cleared and navigation moves
    /// to the login page whatever the server says.
    pub async fn logout(&self) {
        let loading = LoadingGuard::start(&self.store);

        if let Err(error) = self.revoke_refresh_token().await {
            warn!(%error, "refresh token not blacklisted (it may already be invalid)");
        }

        if let Err(error) = self.store.clear_auth() {
            warn!(%error, "persisted tokens could not be erased");
        }
        drop(loading);
        self.navigator.replace(Route::Login);
    }

    /// Best-effort server-side blacklist of the refresh token. The result is only
    /// ever logged by [`Self::logout`].
    async fn revoke_refresh_token(&self) -> Result<(), TransportError> {
        let Some(refresh) = self.store.refresh_token() else {
            return Ok(());
        };
        let bearer = self.store.access_token();
        self.transport.logout(&refresh, bearer.as_deref()).await
    }

    /// Loads the full applicant list, replacing whatever was loaded before.
    /// A 401 here means the session is dead and forces a logout.
    pub async fn fetch_applicants(&self) {
        let _loading = LoadingGuard::start(&self.store);
        self.store.clear_error();

        let bearer = self.store.access_token();
        match self.transport.list_applicants(bearer.as_deref()).await {
            Ok(applicants) => {
                debug!(count = applicants.len(), "applicants loaded");
                self.store.set_applicants(applicants);
            }
            Err(err) => {
                warn!(error = %err, "failed to load applicants");
                self.store.set_error(Some(LOAD_APPLICANTS_FAILED.to_string()));
                if err.is_unauthorized() {
                    info!("session rejected by backend; signing out");
                    self.logout().await;
                }
            }
        }
    }

    /// Cache-first: an applicant already in the loaded list is used without a
    /// network call. Unlike the list fetch, a 401 here does not sign out.
    pub async fn fetch_applicant_by_id(&self, id: &str) {
        let _loading = LoadingGuard::start(&self.store);
        self.store.clear_error();

        if let Some(cached) = self.store.get_applicant_by_id(id) {
            debug!(applicant_id = id, "applicant served from loaded list");
            self.store.set_current_applicant(Some(cached));
            return;
        }

        let bearer = self.store.access_token();
        match self.transport.get_applicant(id, bearer.as_deref()).await {
            Ok(applicant) => self.store.set_current_applicant(Some(applicant)),
            Err(err) => {
                warn!(applicant_id = id, error = %err, "failed to load applicant");
                self.store.set_error(Some(LOAD_DETAILS_FAILED.to_string()));
            }
        }
    }

    /// Sends an HR update. The server's returned record replaces the local copy.
    pub async fn save_applicant(&self, id: &str, patch: &ApplicantPatch) -> bool {
        let _loading = LoadingGuard::start(&self.store);
        self.store.clear_error();

        let bearer = self.store.access_token();
        match self
            .transport
            .update_applicant(id, patch, bearer.as_deref())
            .await
        {
            Ok(updated) => {
                self.store.update_applicant_in_list(updated);
                true
            }
            Err(err) => {
                error!(applicant_id = id, error = %err, "failed to save applicant");
                self.store.set_error(Some(SAVE_FAILED.to_string()));
                false
            }
        }
    }

    /// Public submission. Does not touch the loaded applicant list.
    pub async fn submit_application(&self, form: &ApplicationForm) -> bool {
        let _loading = LoadingGuard::start(&self.store);
        self.store.clear_error();

        match self.transport.submit_application(form).await {
            Ok(()) => {
                info!(email = %form.email, "application submitted");
                self.store.set_has_just_submitted(true);
                true
            }
            Err(err) => {
                error!(error = %err, "application submission failed");
                self.store.set_error(Some(errors::normalize(
                    err.body(),
                    ErrorContext::Submission,
                )));
                false
            }
        }
    }
}
