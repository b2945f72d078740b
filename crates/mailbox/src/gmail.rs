//! Gmail REST API message source
//!
//! Two calls per batch shape: one `messages.list` search, then one
//! `messages.get?format=metadata` per hit, asking only for the `Subject` and
//! `Date` headers.

use std::future::Future;
use std::pin::Pin;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::{MessageMetadata, MessageSource};

/// Production Gmail API base URL.
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";

#[derive(Deserialize)]
struct ListResponse {
    /// Absent when nothing matches
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageResponse {
    id: String,
    /// Unix milliseconds, sent as a string
    internal_date: Option<String>,
    payload: Option<Payload>,
}

#[derive(Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Deserialize)]
struct Header {
    name: String,
    value: String,
}

impl MessageResponse {
    fn header(&self, name: &str) -> Option<String> {
        self.payload
            .as_ref()?
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
    }
}

/// `MessageSource` backed by the Gmail API for the token's own mailbox.
pub struct GmailSource {
    client: reqwest::Client,
    api_base: String,
}

impl GmailSource {
    pub fn new(client: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/gmail/v1/users/me/messages",
            self.api_base.trim_end_matches('/')
        )
    }

    async fn list_ids(&self, access_token: &str, query: &str, max_results: u32) -> Result<Vec<String>> {
        let max_results = max_results.to_string();
        let response = self
            .client
            .get(self.messages_url())
            .bearer_auth(access_token)
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("list request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::Upstream(format!("list returned {status}: {body}")));
        }

        let listing = response
            .json::<ListResponse>()
            .await
            .map_err(|e| Error::Upstream(format!("invalid list response: {e}")))?;
        debug!(count = listing.messages.len(), "gmail listing");
        Ok(listing.messages.into_iter().map(|m| m.id).collect())
    }

    async fn fetch_metadata(&self, access_token: &str, message_id: &str) -> Result<MessageMetadata> {
        let failed = |reason: String| Error::Message {
            id: message_id.to_owned(),
            reason,
        };

        // Gmail ids are hex; anything else would need path escaping and is not ours
        if message_id.is_empty() || !message_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(failed("malformed message id".into()));
        }

        let response = self
            .client
            .get(format!("{}/{message_id}", self.messages_url()))
            .bearer_auth(access_token)
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "Subject"),
                ("metadataHeaders", "Date"),
            ])
            .send()
            .await
            .map_err(|e| failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("get returned {status}")));
        }

        let message = response
            .json::<MessageResponse>()
            .await
            .map_err(|e| failed(format!("invalid message response: {e}")))?;

        Ok(MessageMetadata {
            subject: message.header("Subject"),
            date: message.header("Date"),
            internal_date: message.internal_date.as_deref().and_then(|d| d.parse().ok()),
            id: message.id,
        })
    }
}

impl MessageSource for GmailSource {
    fn id(&self) -> &str {
        "gmail"
    }

    fn list<'a>(
        &'a self,
        access_token: &'a str,
        query: &'a str,
        max_results: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>> {
        Box::pin(self.list_ids(access_token, query, max_results))
    }

    fn metadata<'a>(
        &'a self,
        access_token: &'a str,
        message_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<MessageMetadata>> + Send + 'a>> {
        Box::pin(self.fetch_metadata(access_token, message_id))
    }
}
