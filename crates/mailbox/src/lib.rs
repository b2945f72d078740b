//! Mailbox query and check-in record normalization
//!
//! Defines the `MessageSource` trait that decouples the record pipeline from
//! the mail provider's API. `GmailSource` talks to the Gmail REST API;
//! tests plug in in-memory sources. `MailboxService` takes an authorized
//! `AuthClient`, searches the user's mailbox and turns each matching message
//! into a `CheckInRecord` for the badge display.

pub mod error;
pub mod gmail;
pub mod query;
pub mod service;

pub use error::{Error, Result};
pub use gmail::GmailSource;
pub use query::search_query;
pub use service::{CheckInRecord, MailboxBatch, MailboxService, MailboxSettings, RecordTemplate};

use std::future::Future;
use std::pin::Pin;

/// Header fields of one message, as much as the record pipeline needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageMetadata {
    /// Provider message id
    pub id: String,
    pub subject: Option<String>,
    /// Raw RFC 2822 `Date` header
    pub date: Option<String>,
    /// Provider receive time, unix milliseconds
    pub internal_date: Option<i64>,
}

/// Abstraction over the provider's message search API.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn MessageSource>`).
pub trait MessageSource: Send + Sync {
    /// Identifier for logging (e.g. "gmail")
    fn id(&self) -> &str;

    /// Ids of the newest messages matching `query`, at most `max_results`.
    /// A failure here fails the whole batch.
    fn list<'a>(
        &'a self,
        access_token: &'a str,
        query: &'a str,
        max_results: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send + 'a>>;

    /// Header metadata for one message. A failure here drops only that message.
    fn metadata<'a>(
        &'a self,
        access_token: &'a str,
        message_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<MessageMetadata>> + Send + 'a>>;
}
