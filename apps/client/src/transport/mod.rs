//! Transport seam between the service and the backend.
//!
//! [`HttpTransport`] is the production implementation; tests script their own.

pub mod http;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Applicant, ApplicantPatch, ApplicationForm, Credentials, TokenPair};

pub use http::HttpTransport;

pub const UNAUTHORIZED: u16 = 401;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The request never produced a response (DNS, refused connection, reset).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server responded with status {status}")]
    Status { status: u16, body: Option<Value> },

    /// A success response whose payload did not have the expected shape.
    #[error("unexpected response payload: {0}")]
    Decode(String),

    /// The request could not be built (bad URL, unreadable attachment metadata).
    #[error("invalid request: {0}")]
    Request(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The structured body, if the server sent one.
    pub fn body(&self) -> Option<&Value> {
        match self {
            TransportError::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(UNAUTHORIZED)
    }
}

/// Backend operations the service depends on.
///
/// Protected calls receive the caller's access token as `bearer`; the transport
/// decides how to attach it. `None` means the request goes out unauthenticated.
#[async_trait]
pub trait ApplicantTransport: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, TransportError>;

    /// Blacklists the refresh token server-side.
    async fn logout(&self, refresh_token: &str, bearer: Option<&str>)
        -> Result<(), TransportError>;

    async fn list_applicants(&self, bearer: Option<&str>)
        -> Result<Vec<Applicant>, TransportError>;

    async fn get_applicant(
        &self,
        id: &str,
        bearer: Option<&str>,
    ) -> Result<Applicant, TransportError>;

    async fn update_applicant(
        &self,
        id: &str,
        patch: &ApplicantPatch,
        bearer: Option<&str>,
    ) -> Result<Applicant, TransportError>;

    /// Public endpoint; no bearer is sent.
    async fn submit_application(&self, form: &ApplicationForm) -> Result<(), TransportError>;
}

/// A genuine connection-refused failure: the port is bound, released, then dialled.
#[cfg(test)]
pub(crate) async fn refused_connection() -> TransportError {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    match reqwest::get(format!("http://{addr}/")).await {
        Ok(response) => panic!("nothing should answer on {addr}: {}", response.status()),
        Err(e) => TransportError::Network(e),
    }
}
