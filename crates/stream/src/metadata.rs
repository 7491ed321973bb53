//! Off-band token metadata resolution
//!
//! Creation events often carry a `uri` pointing at a JSON document with the
//! token's display metadata. Social links appear either at the top level or
//! under an `extensions` object.

use serde_json::Value;
use tracing::debug;

use tokenfeed_core::{FetchError, FetchResult, NormalizedToken};

/// Display metadata resolved from a metadata document.
///
/// Fields are `None` when the document omits them, so the raw event values
/// survive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub website: Option<String>,
}

impl TokenMetadata {
    pub fn from_document(doc: &Value) -> Self {
        let extensions = doc.get("extensions");
        let social = |key: &str| text(doc.get(key)).or_else(|| text(extensions.and_then(|e| e.get(key))));

        Self {
            name: text(doc.get("name")),
            symbol: text(doc.get("symbol")),
            description: text(doc.get("description")),
            image: text(doc.get("image")),
            twitter: social("twitter"),
            telegram: social("telegram"),
            website: social("website"),
        }
    }

    /// Overlay resolved metadata onto a normalized token
    pub fn apply_to(self, token: &mut NormalizedToken) {
        if let Some(name) = self.name {
            token.name = name;
        }
        if let Some(symbol) = self.symbol {
            token.symbol = symbol;
        }
        if let Some(description) = self.description {
            token.description = description;
        }
        if let Some(image) = self.image {
            token.image = image;
        }
        token.twitter = self.twitter.or(token.twitter.take());
        token.telegram = self.telegram.or(token.telegram.take());
        token.website = self.website.or(token.website.take());
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Source of off-band metadata documents
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self, uri: &str) -> FetchResult<TokenMetadata>;
}

/// Fetches metadata documents over HTTP
#[derive(Debug, Clone, Default)]
pub struct HttpMetadataSource {
    client: reqwest::Client,
}

impl HttpMetadataSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl MetadataSource for HttpMetadataSource {
    async fn fetch(&self, uri: &str) -> FetchResult<TokenMetadata> {
        debug!("Fetching metadata from {}", uri);

        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|e| FetchError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url: uri.to_string(),
            });
        }

        let doc: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        Ok(TokenMetadata::from_document(&doc))
    }
}
