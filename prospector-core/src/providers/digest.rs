use async_trait::async_trait;
use thiserror::Error;

use crate::types::CrawlerConfig;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("Digest has no recipients")]
    NoRecipients,

    #[error("Digest service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Digest service unreachable: {0}")]
    Network(#[from] reqwest::Error),
}

#[async_trait]
pub trait DigestSender: Send + Sync {
    /// Sends the crawler's digest right away to its configured recipients.
    async fn send_test_digest(&self, config: &CrawlerConfig) -> Result<(), DigestError>;
}
