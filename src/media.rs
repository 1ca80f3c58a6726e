use serde::Deserialize;
use tracing::info;

use crate::config::MediaSettings;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Client for the image host. Uploads go to an unsigned upload endpoint
/// and the returned durable URL is what gets persisted on the event.
#[derive(Clone)]
pub struct MediaClient {
    http: reqwest::Client,
    settings: MediaSettings,
}

impl MediaClient {
    pub fn new(settings: MediaSettings) -> Self {
        MediaClient {
            http: reqwest::Client::new(),
            settings,
        }
    }

    pub async fn upload_image(&self, bytes: Vec<u8>, file_name: &str) -> Result<String, String> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("upload_preset", self.settings.upload_preset.clone())
            .text("folder", self.settings.folder.clone())
            .part("file", part);

        let response = self
            .http
            .post(&self.settings.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| format!("Image upload request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Image host returned status {}", response.status()));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| format!("Invalid image host response: {}", e))?;

        info!(file_name = %file_name, url = %uploaded.secure_url, "Image uploaded");

        Ok(uploaded.secure_url)
    }
}
