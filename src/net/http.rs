use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::transport::{GalleryTransport, TransportError};
use super::wire::{Reply, WireImage};
use crate::config::Config;
use crate::state::data::{ImageId, ImageRecord, NamedUpload, SessionContext};

const FETCH_ENDPOINT: &str = "get_user_images";
const UPLOAD_ENDPOINT: &str = "upload_user_images";
const DELETE_ENDPOINT: &str = "delete_user_image";
const PROFILE_ENDPOINT: &str = "set_profile_picture";

/// Talks to the gallery backend over HTTP.
/// Every call is a multipart POST carrying `user_id` plus the bearer token.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(network_error)?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }

    fn owner_form(session: &SessionContext) -> Form {
        Form::new().text("user_id", session.owner_id.to_string())
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        session: &SessionContext,
        form: Form,
    ) -> Result<Reply<T>, TransportError> {
        debug!("POST {} for user {}", endpoint, session.owner_id);

        let response = self
            .client
            .post(self.endpoint(endpoint))
            .bearer_auth(&session.auth_token)
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        let http_status = response.status();
        let body = response.text().await.map_err(network_error)?;

        Reply::parse(&body).map_err(|e| {
            if http_status.is_success() {
                TransportError::Decode(e.to_string())
            } else {
                TransportError::Network(format!("HTTP {}", http_status))
            }
        })
    }

    /// Download the bytes of one stored image (see `ImageRecord::display_uri`)
    pub async fn fetch_image(&self, session: &SessionContext, uri: &str) -> Result<Vec<u8>, TransportError> {
        debug!("GET {}", uri);

        let response = self
            .client
            .get(uri)
            .bearer_auth(&session.auth_token)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(network_error)?;

        let bytes = response.bytes().await.map_err(network_error)?;
        Ok(bytes.to_vec())
    }
}

impl GalleryTransport for HttpTransport {
    async fn fetch_images(&self, session: &SessionContext) -> Result<Vec<ImageRecord>, TransportError> {
        let reply: Reply<Vec<WireImage>> = self
            .post(FETCH_ENDPOINT, session, Self::owner_form(session))
            .await?;

        let rows = reply.into_result("Failed to load images")?.unwrap_or_default();
        Ok(rows
            .into_iter()
            .map(|row| row.into_record(session.owner_id))
            .collect())
    }

    async fn upload_images(
        &self,
        session: &SessionContext,
        files: &[NamedUpload],
    ) -> Result<Vec<ImageRecord>, TransportError> {
        let mut form = Self::owner_form(session);

        for upload in files {
            let bytes = tokio::fs::read(upload.file.as_path())
                .await
                .map_err(|e| TransportError::File {
                    path: upload.file.as_path().display().to_string(),
                    message: e.to_string(),
                })?;

            let part = Part::bytes(bytes)
                .file_name(upload.upload_name.clone())
                .mime_str(upload.mime_type)
                .map_err(network_error)?;
            form = form.part("images[]", part);
        }

        info!("⬆️  Uploading {} images for user {}", files.len(), session.owner_id);

        let reply: Reply<Vec<WireImage>> = self.post(UPLOAD_ENDPOINT, session, form).await?;
        let rows = reply.into_result("Failed to upload images")?.unwrap_or_default();
        Ok(rows
            .into_iter()
            .map(|row| row.into_record(session.owner_id))
            .collect())
    }

    async fn delete_image(&self, session: &SessionContext, image_id: ImageId) -> Result<(), TransportError> {
        let form = Self::owner_form(session).text("image_id", image_id.to_string());
        let reply: Reply<Value> = self.post(DELETE_ENDPOINT, session, form).await?;
        reply.into_result("Failed to delete image")?;
        Ok(())
    }

    async fn set_profile_picture(
        &self,
        session: &SessionContext,
        image_id: ImageId,
    ) -> Result<(), TransportError> {
        let form = Self::owner_form(session).text("image_id", image_id.to_string());
        let reply: Reply<Value> = self.post(PROFILE_ENDPOINT, session, form).await?;
        reply.into_result("Failed to set profile picture")?;
        Ok(())
    }
}

fn network_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Network("request timed out".to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}
