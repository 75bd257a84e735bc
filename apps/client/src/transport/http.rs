//! reqwest-backed transport for the applicant backend.
//!
//! Routes are resolved against the configured API root (`.../api/`):
//! `token/`, `logout/`, `applicants/` and `applicants/{id}/`.
//!
//! No request timeout is configured: a slow call keeps the caller's loading flag
//! raised until the server answers or the connection drops.

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ApplicantTransport, TransportError};
use crate::models::{Applicant, ApplicantPatch, ApplicationForm, Credentials, TokenPair};

const RESUME_FIELD: &str = "resume_file";

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: Url) -> Result<Self, TransportError> {
        let client = Client::builder()
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::Request(format!("bad endpoint '{path}': {e}")))
    }

    /// `applicants/{id}/` with the id percent-encoded as a single path segment.
    fn applicant_url(&self, id: &str) -> Result<Url, TransportError> {
        let mut url = self.endpoint("applicants/")?;
        url.path_segments_mut()
            .map_err(|_| TransportError::Request("API base URL cannot hold a path".to_string()))?
            .pop_if_empty()
            .push(id)
            .push("");
        Ok(url)
    }

    /// Sends the request and splits the outcome into success or a structured failure.
    async fn send(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                TransportError::Request(e.to_string())
            } else {
                TransportError::Network(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), url = %response.url(), "backend call succeeded");
            return Ok(response);
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(error) => {
                warn!(status = status.as_u16(), %error, "error response body could not be read");
                String::new()
            }
        };
        warn!(status = status.as_u16(), "backend returned an error response");
        Err(TransportError::Status {
            status: status.as_u16(),
            body: parse_error_body(&text),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
        let bytes = response
            .bytes()
            .await
            .map_err(TransportError::Network)?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
    }

    fn multipart_form(form: &ApplicationForm) -> Result<multipart::Form, TransportError> {
        let mut multipart_form = multipart::Form::new();
        for (name, value) in form.text_fields() {
            multipart_form = multipart_form.text(name, value.to_string());
        }

        if let Some(file) = &form.resume_file {
            let part = multipart::Part::bytes(file.bytes.to_vec())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)
                .map_err(|e| {
                    TransportError::Request(format!(
                        "invalid content type '{}': {e}",
                        file.content_type
                    ))
                })?;
            multipart_form = multipart_form.part(RESUME_FIELD, part);
        }

        Ok(multipart_form)
    }
}

#[async_trait]
impl ApplicantTransport for HttpTransport {
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, TransportError> {
        let request = self.client.post(self.endpoint("token/")?).json(credentials);
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn logout(
        &self,
        refresh_token: &str,
        bearer: Option<&str>,
    ) -> Result<(), TransportError> {
        let request = self
            .client
            .post(self.endpoint("logout/")?)
            .json(&json!({ "refresh": refresh_token }));
        self.send(with_bearer(request, bearer)).await?;
        Ok(())
    }

    async fn list_applicants(
        &self,
        bearer: Option<&str>,
    ) -> Result<Vec<Applicant>, TransportError> {
        let request = self.client.get(self.endpoint("applicants/")?);
        let response = self.send(with_bearer(request, bearer)).await?;
        Self::decode(response).await
    }

    async fn get_applicant(
        &self,
        id: &str,
        bearer: Option<&str>,
    ) -> Result<Applicant, TransportError> {
        let request = self.client.get(self.applicant_url(id)?);
        let response = self.send(with_bearer(request, bearer)).await?;
        Self::decode(response).await
    }

    async fn update_applicant(
        &self,
        id: &str,
        patch: &ApplicantPatch,
        bearer: Option<&str>,
    ) -> Result<Applicant, TransportError> {
        let request = self.client.patch(self.applicant_url(id)?).json(patch);
        let response = self.send(with_bearer(request, bearer)).await?;
        Self::decode(response).await
    }

    async fn submit_application(&self, form: &ApplicationForm) -> Result<(), TransportError> {
        let request = self
            .client
            .post(self.endpoint("applicants/")?)
            .multipart(Self::multipart_form(form)?);
        self.send(request).await?;
        Ok(())
    }
}

fn with_bearer(request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// JSON bodies are kept structured; anything else (HTML error pages) is kept as text.
fn parse_error_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}
