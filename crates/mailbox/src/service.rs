//! Check-in record pipeline
//!
//! One `fetch` is one batch: token, search, concurrent metadata lookups,
//! normalization. The search failing fails the batch; a single message
//! failing only removes that message.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use google_auth::AuthClient;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::query::search_query;
use crate::{MessageMetadata, MessageSource};

/// Fixed fields stamped onto every record for the badge display.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTemplate {
    pub location: String,
    pub qr_payload: String,
    /// Prefix for per-message deep links; the provider message id is appended.
    pub link_base: String,
}

#[derive(Debug, Clone)]
pub struct MailboxSettings {
    pub subject_keyword: String,
    pub max_results: u32,
    pub template: RecordTemplate,
}

/// One normalized message, as served on `/qr/{name}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRecord {
    /// Fresh per fetch; not the provider's message id
    pub id: String,
    pub date: DateTime<Utc>,
    pub location: String,
    /// Requesting user's identity
    pub name: String,
    pub link: String,
    pub qr_code: String,
    pub subject: String,
}

/// Result of one fetch.
#[derive(Debug, Default)]
pub struct MailboxBatch {
    pub records: Vec<CheckInRecord>,
    /// Messages listed but left out because their details failed
    pub dropped: usize,
}

pub struct MailboxService {
    source: Arc<dyn MessageSource>,
    settings: MailboxSettings,
}

impl MailboxService {
    pub fn new(source: Arc<dyn MessageSource>, settings: MailboxSettings) -> Self {
        Self { source, settings }
    }

    /// The provider search string this service issues.
    pub fn query(&self) -> String {
        search_query(&self.settings.subject_keyword)
    }

    /// Fetch and normalize the newest matching messages for `client`'s user.
    pub async fn fetch(&self, client: &AuthClient) -> Result<MailboxBatch> {
        let user = client.user();
        let token = client.access_token().await?;
        let query = self.query();

        let ids = self
            .source
            .list(&token, &query, self.settings.max_results)
            .await?;

        let lookups = ids.iter().map(|id| self.source.metadata(&token, id));
        let results = join_all(lookups).await;

        let mut batch = MailboxBatch::default();
        for result in results {
            match result.and_then(|meta| self.normalize(user.as_str(), meta)) {
                Ok(record) => batch.records.push(record),
                Err(e) => {
                    warn!(user = %user, source = self.source.id(), error = %e, "dropping message");
                    batch.dropped += 1;
                }
            }
        }

        info!(
            user = %user,
            source = self.source.id(),
            listed = ids.len(),
            records = batch.records.len(),
            dropped = batch.dropped,
            "mailbox fetched"
        );
        Ok(batch)
    }

    fn normalize(&self, user: &str, meta: MessageMetadata) -> Result<CheckInRecord> {
        let date = message_date(&meta).ok_or_else(|| Error::Message {
            id: meta.id.clone(),
            reason: "no parseable Date header or internal date".into(),
        })?;
        let template = &self.settings.template;

        Ok(CheckInRecord {
            id: uuid::Uuid::new_v4().to_string(),
            date,
            location: template.location.clone(),
            name: user.to_owned(),
            link: format!("{}{}", template.link_base, meta.id),
            qr_code: template.qr_payload.clone(),
            subject: meta.subject.unwrap_or_default(),
        })
    }
}

/// `Date` header first, provider receive time second.
fn message_date(meta: &MessageMetadata) -> Option<DateTime<Utc>> {
    meta.date
        .as_deref()
        .and_then(parse_date_header)
        .or_else(|| meta.internal_date.and_then(DateTime::from_timestamp_millis))
}

fn parse_date_header(value: &str) -> Option<DateTime<Utc>> {
    // Strip a trailing zone comment such as "(UTC)"
    let value = value.split('(').next().unwrap_or(value).trim();
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
