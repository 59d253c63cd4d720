//! `reqwest`-backed remote collection.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use tally_core::{Identifier, Item, ItemPatch, NewItem, RemoteCollection, RemoteResult};
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};
use crate::problem::{decode, ensure_success, transport};

/// Header carrying the per-process request identifier.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Remote collection reached over HTTP at `{base_url}/{resource}`.
#[derive(Debug, Clone)]
pub struct HttpCollection {
    client: Client,
    collection_url: Url,
}

impl HttpCollection {
    /// Build a client with a transport timeout and a request-id header.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the client cannot be built or the URL
    /// cannot hold the resource path.
    pub fn new(base_url: &Url, resource: &str, timeout: Duration) -> ClientResult<Self> {
        let mut headers = HeaderMap::new();
        // A hyphenated v4 uuid is always a valid header value.
        if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            headers.insert(HEADER_REQUEST_ID, value);
        }
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|source| ClientError::Build { source })?;
        Self::with_client(client, base_url, resource)
    }

    /// Wrap an existing client.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when `resource` is blank or `base_url` cannot
    /// hold a path.
    pub fn with_client(client: Client, base_url: &Url, resource: &str) -> ClientResult<Self> {
        let resource = resource.trim().trim_matches('/');
        if resource.is_empty() {
            return Err(ClientError::EmptyResource);
        }
        let mut collection_url = base_url.clone();
        {
            let mut segments =
                collection_url
                    .path_segments_mut()
                    .map_err(|()| ClientError::InvalidBaseUrl {
                        url: base_url.to_string(),
                    })?;
            segments.pop_if_empty();
            for segment in resource.split('/').filter(|segment| !segment.is_empty()) {
                segments.push(segment);
            }
        }
        Ok(Self {
            client,
            collection_url,
        })
    }

    /// `{base_url}/{resource}`.
    #[must_use]
    pub const fn collection_url(&self) -> &Url {
        &self.collection_url
    }

    /// `{base_url}/{resource}/{id}` with the id percent-encoded.
    #[must_use]
    pub fn item_url(&self, id: &Identifier) -> Url {
        let mut url = self.collection_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&id.key());
        }
        url
    }

    async fn replace(&self, item: &Item) -> RemoteResult<Item> {
        let response = self
            .client
            .put(self.item_url(&item.id))
            .json(item)
            .send()
            .await
            .map_err(|err| transport("update", err))?;
        let response = ensure_success("update", response).await?;
        response.json().await.map_err(|err| decode("update", err))
    }
}

#[async_trait]
impl RemoteCollection for HttpCollection {
    #[instrument(skip(self), fields(url = %self.collection_url))]
    async fn list(&self) -> RemoteResult<Vec<Item>> {
        let response = self
            .client
            .get(self.collection_url.clone())
            .send()
            .await
            .map_err(|err| transport("list", err))?;
        let response = ensure_success("list", response).await?;
        response.json().await.map_err(|err| decode("list", err))
    }

    #[instrument(skip(self), fields(url = %self.collection_url))]
    async fn create(&self, title: &str) -> RemoteResult<Item> {
        let response = self
            .client
            .post(self.collection_url.clone())
            .json(&NewItem::new(title))
            .send()
            .await
            .map_err(|err| transport("create", err))?;
        let response = ensure_success("create", response).await?;
        response.json().await.map_err(|err| decode("create", err))
    }

    #[instrument(skip(self, item, patch), fields(key = %item.id))]
    async fn update(&self, item: &Item, patch: &ItemPatch) -> RemoteResult<Item> {
        let response = self
            .client
            .patch(self.item_url(&item.id))
            .json(patch)
            .send()
            .await
            .map_err(|err| transport("update", err))?;

        if matches!(
            response.status(),
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
        ) {
            debug!(status = response.status().as_u16(), "PATCH refused; retrying as PUT");
            return self.replace(item).await;
        }
        let response = ensure_success("update", response).await?;
        response.json().await.map_err(|err| decode("update", err))
    }

    #[instrument(skip(self), fields(key = %id))]
    async fn delete(&self, id: &Identifier) -> RemoteResult<()> {
        let response = self
            .client
            .delete(self.item_url(id))
            .send()
            .await
            .map_err(|err| transport("delete", err))?;
        ensure_success("delete", response).await.map(|_| ())
    }
}
