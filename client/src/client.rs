//! Content API client implementation

use crate::{
    error::ClientError,
    types::{
        ChangelogEntry, EventRecord, Flash, RegistrationReceipt, RegistrationRequest,
        RegistrationStatus, SiteConfigRecord, SubscribeResponse, Subscriber, VehicleRecord,
    },
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

/// Content API client
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct SiteClient {
    client: Client,
    api_url: String,
}

impl SiteClient {
    /// Create a client for the API at `api_url`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if `api_url` is not an absolute URL.
    pub fn new(api_url: &str) -> Result<Self, ClientError> {
        Self::with_client(api_url, Client::new())
    }

    /// Create a client whose requests give up after `timeout`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] for a bad URL, or
    /// [`ClientError::Unreachable`] if the HTTP client cannot be built.
    pub fn with_timeout(api_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;
        Self::with_client(api_url, client)
    }

    fn with_client(api_url: &str, client: Client) -> Result<Self, ClientError> {
        Url::parse(api_url).map_err(|e| ClientError::InvalidUrl(format!("{api_url}: {e}")))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without trailing slash
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    /// Send a request and turn non-success statuses into errors
    async fn execute(request: RequestBuilder, path: &str) -> Result<Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Unreachable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(path.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::Api {
                    status: status.as_u16(),
                    message: body,
                })
            },
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        tracing::debug!(path, "GET");
        let response = Self::execute(self.client.get(self.url(path)), path).await?;
        Self::decode(response).await
    }

    /// Lists may come back as `null`
    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ClientError> {
        Ok(self
            .get_json::<Option<Vec<T>>>(path)
            .await?
            .unwrap_or_default())
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// `GET /public/events`
    ///
    /// # Errors
    ///
    /// Returns transport, status, or parsing errors.
    #[tracing::instrument(skip(self))]
    pub async fn list_events(&self) -> Result<Vec<EventRecord>, ClientError> {
        self.get_list("/public/events").await
    }

    /// `GET /public/events/{id}`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] for an unknown id, and transport,
    /// status, or parsing errors otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn get_event(&self, id: &str) -> Result<EventRecord, ClientError> {
        self.get_json(&format!("/public/events/{}", urlencoding::encode(id)))
            .await
    }

    // ========================================================================
    // Registrations
    // ========================================================================

    /// `POST /registrations`
    ///
    /// # Errors
    ///
    /// Returns transport, status, or parsing errors.
    #[tracing::instrument(skip(self, request), fields(event_id = %request.event_id))]
    pub async fn create_registration(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationReceipt, ClientError> {
        let path = "/registrations";
        tracing::debug!(path, "POST");
        let response = Self::execute(self.client.post(self.url(path)).json(request), path).await?;
        Self::decode(response).await
    }

    /// `GET /registrations/{id}/status`
    ///
    /// # Errors
    ///
    /// Returns transport, status, or parsing errors.
    #[tracing::instrument(skip(self))]
    pub async fn registration_status(&self, id: &str) -> Result<RegistrationStatus, ClientError> {
        self.get_json(&format!("/registrations/{}/status", urlencoding::encode(id)))
            .await
    }

    // ========================================================================
    // Newsletter
    // ========================================================================

    /// `POST /newsletter/subscribe`
    ///
    /// A body without a `duplicated` flag counts as a fresh subscription.
    ///
    /// # Errors
    ///
    /// Returns transport or status errors.
    #[tracing::instrument(skip(self, email))]
    pub async fn subscribe(&self, email: &str) -> Result<SubscribeResponse, ClientError> {
        let path = "/newsletter/subscribe";
        tracing::debug!(path, "POST");
        let response = Self::execute(
            self.client.post(self.url(path)).json(&json!({ "email": email })),
            path,
        )
        .await?;

        let body = response.text().await.map_err(ClientError::from)?;
        Ok(serde_json::from_str(&body).unwrap_or_else(|_| {
            tracing::debug!(body = %body, "Subscribe response without JSON body");
            SubscribeResponse::default()
        }))
    }

    /// `GET /newsletter`
    ///
    /// # Errors
    ///
    /// Returns transport, status, or parsing errors.
    #[tracing::instrument(skip(self))]
    pub async fn list_subscribers(&self) -> Result<Vec<Subscriber>, ClientError> {
        self.get_list("/newsletter").await
    }

    /// `POST /newsletter`
    ///
    /// # Errors
    ///
    /// Returns transport or status errors.
    #[tracing::instrument(skip(self, email))]
    pub async fn add_subscriber(&self, email: &str) -> Result<(), ClientError> {
        let path = "/newsletter";
        tracing::debug!(path, "POST");
        Self::execute(
            self.client.post(self.url(path)).json(&json!({ "email": email })),
            path,
        )
        .await?;
        Ok(())
    }

    /// `DELETE /newsletter/{id}`
    ///
    /// # Errors
    ///
    /// Returns transport or status errors.
    #[tracing::instrument(skip(self))]
    pub async fn delete_subscriber(&self, id: &str) -> Result<(), ClientError> {
        let path = format!("/newsletter/{}", urlencoding::encode(id));
        tracing::debug!(path = %path, "DELETE");
        Self::execute(self.client.delete(self.url(&path)), &path).await?;
        Ok(())
    }

    // ========================================================================
    // Site content
    // ========================================================================

    /// `GET /public/flashes`
    ///
    /// # Errors
    ///
    /// Returns transport, status, or parsing errors.
    #[tracing::instrument(skip(self))]
    pub async fn list_flashes(&self) -> Result<Vec<Flash>, ClientError> {
        self.get_list("/public/flashes").await
    }

    /// `GET /public/site-config`
    ///
    /// # Errors
    ///
    /// Returns transport, status, or parsing errors.
    #[tracing::instrument(skip(self))]
    pub async fn site_config(&self) -> Result<SiteConfigRecord, ClientError> {
        self.get_json("/public/site-config").await
    }

    /// `GET /public/vehicles`
    ///
    /// # Errors
    ///
    /// Returns transport, status, or parsing errors.
    #[tracing::instrument(skip(self))]
    pub async fn list_vehicles(&self) -> Result<Vec<VehicleRecord>, ClientError> {
        self.get_list("/public/vehicles").await
    }

    /// `GET /public/vehicles/{id}`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] for an unknown id, and transport,
    /// status, or parsing errors otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn get_vehicle(&self, id: &str) -> Result<VehicleRecord, ClientError> {
        self.get_json(&format!("/public/vehicles/{}", urlencoding::encode(id)))
            .await
    }

    /// `GET /public/vehicles/{id}/events`
    ///
    /// # Errors
    ///
    /// Returns transport, status, or parsing errors.
    #[tracing::instrument(skip(self))]
    pub async fn vehicle_events(&self, id: &str) -> Result<Vec<EventRecord>, ClientError> {
        self.get_list(&format!("/public/vehicles/{}/events", urlencoding::encode(id)))
            .await
    }

    /// `GET /public/changelog`
    ///
    /// # Errors
    ///
    /// Returns transport, status, or parsing errors.
    #[tracing::instrument(skip(self))]
    pub async fn changelog(&self) -> Result<Vec<ChangelogEntry>, ClientError> {
        self.get_list("/public/changelog").await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_client_creation() {
        let client = SiteClient::new("http://localhost:4000/").unwrap();
        assert_eq!(client.api_url(), "http://localhost:4000");
        assert_eq!(client.url("/public/events"), "http://localhost:4000/public/events");
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(matches!(
            SiteClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
