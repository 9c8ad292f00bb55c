// src/publish/linkedin.rs
//! LinkedIn UGC posts, with the register → upload → reference flow for images.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{Identity, PublishReceipt, PublishRequest, Publisher};
use crate::config::is_placeholder;
use crate::error::PublishError;

pub const DEFAULT_BASE_URL: &str = "https://api.linkedin.com";
const UPLOAD_MECHANISM: &str = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest";

#[derive(Debug, Clone)]
pub struct LinkedInSettings {
    pub access_token: String,
    pub person_id: Option<String>,
    pub organization_id: Option<String>,
    pub base_url: String,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
}

impl LinkedInSettings {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            person_id: None,
            organization_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
pub struct LinkedInClient {
    client: Client,
    settings: LinkedInSettings,
}

#[derive(Deserialize)]
struct RegisterResp {
    value: RegisterValue,
}

#[derive(Deserialize)]
struct RegisterValue {
    asset: String,
    #[serde(rename = "uploadMechanism")]
    upload_mechanism: serde_json::Value,
}

impl LinkedInClient {
    pub fn new(settings: LinkedInSettings) -> Result<Self, PublishError> {
        if is_placeholder(&settings.access_token) {
            return Err(PublishError::Configuration(
                "LINKEDIN_ACCESS_TOKEN is not set".into(),
            ));
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    /// `urn:li:person:<id>` or `urn:li:organization:<id>`.
    pub fn author_urn(&self, identity: Identity) -> Result<String, PublishError> {
        let (kind, id, var) = match identity {
            Identity::Personal => ("person", &self.settings.person_id, "LINKEDIN_PERSON_ID"),
            Identity::Organization => (
                "organization",
                &self.settings.organization_id,
                "LINKEDIN_ORGANIZATION_ID",
            ),
        };
        match id.as_deref().map(str::trim) {
            Some(id) if !is_placeholder(id) => Ok(format!("urn:li:{kind}:{id}")),
            _ => Err(PublishError::Configuration(format!(
                "{var} is required for --as {identity}"
            ))),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url.trim_end_matches('/'))
    }

    /// Register the upload, PUT the bytes, return the asset URN.
    pub async fn upload_image(&self, image: &Path, owner_urn: &str) -> Result<String, PublishError> {
        let body = json!({
            "registerUploadRequest": {
                "recipes": ["urn:li:digitalmediaRecipe:feedshare-image"],
                "owner": owner_urn,
                "serviceRelationships": [{
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent"
                }]
            }
        });

        let resp = self
            .client
            .post(self.url("/v2/assets?action=registerUpload"))
            .bearer_auth(&self.settings.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(PublishError::Upload(format!(
                "register upload returned HTTP {}: {text}",
                status.as_u16()
            )));
        }
        let reg: RegisterResp = resp.json().await?;
        let upload_url = reg
            .value
            .upload_mechanism
            .get(UPLOAD_MECHANISM)
            .and_then(|m| m.get("uploadUrl"))
            .and_then(|u| u.as_str())
            .ok_or_else(|| PublishError::Upload("register response has no uploadUrl".into()))?
            .to_string();

        let bytes = tokio::fs::read(image)
            .await
            .map_err(|e| PublishError::Upload(format!("reading {}: {e}", image.display())))?;

        let put = self
            .client
            .put(&upload_url)
            .bearer_auth(&self.settings.access_token)
            .timeout(self.settings.upload_timeout)
            .body(bytes)
            .send()
            .await?;
        let put_status = put.status().as_u16();
        if !matches!(put_status, 200 | 201) {
            let text = put.text().await.unwrap_or_default();
            return Err(PublishError::Upload(format!(
                "binary upload returned HTTP {put_status}: {text}"
            )));
        }

        info!(asset = %reg.value.asset, "image uploaded");
        Ok(reg.value.asset)
    }
}

fn ugc_body(author: &str, text: &str, image_asset: Option<&str>) -> serde_json::Value {
    let mut share = json!({
        "shareCommentary": { "text": text },
        "shareMediaCategory": "NONE"
    });
    if let Some(asset) = image_asset {
        share["shareMediaCategory"] = json!("IMAGE");
        share["media"] = json!([{ "status": "READY", "media": asset }]);
    }
    json!({
        "author": author,
        "lifecycleState": "PUBLISHED",
        "specificContent": { "com.linkedin.ugc.ShareContent": share },
        "visibility": { "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC" }
    })
}

#[async_trait]
impl Publisher for LinkedInClient {
    fn ready_for(&self, identity: Identity) -> Result<(), PublishError> {
        self.author_urn(identity).map(|_| ())
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishReceipt, PublishError> {
        let author = self.author_urn(request.identity)?;

        let image_asset = match &request.image {
            Some(path) => Some(self.upload_image(path, &author).await?),
            None => None,
        };

        let resp = self
            .client
            .post(self.url("/v2/ugcPosts"))
            .bearer_auth(&self.settings.access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&ugc_body(&author, &request.text, image_asset.as_deref()))
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 201 {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Rejected { status, body });
        }
        let post_id = resp
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        info!(identity = %request.identity, post_id = ?post_id, "post published");
        Ok(PublishReceipt {
            identity: request.identity,
            status,
            post_id,
            image_asset,
        })
    }
}
