//! Outgoing mail.

use crate::core::Result;
use async_trait::async_trait;
use std::sync::Mutex;

/// Email dispatch primitive used by email handlers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_mail(
        &self,
        subject: &str,
        body: &str,
        from_email: &str,
        recipients: &[String],
    ) -> Result<()>;
}

/// Writes every message to the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_mail(
        &self,
        subject: &str,
        body: &str,
        from_email: &str,
        recipients: &[String],
    ) -> Result<()> {
        log::info!(
            "Mail from {} to [{}]: {} ({} bytes)",
            from_email,
            recipients.join(", "),
            subject,
            body.len()
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub subject: String,
    pub body: String,
    pub from_email: String,
    pub recipients: Vec<String>,
}

/// Keeps sent messages in memory.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<SentMail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outbox(&self) -> Result<Vec<SentMail>> {
        Ok(self.outbox.lock()?.clone())
    }

    pub fn clear(&self) -> Result<()> {
        self.outbox.lock()?.clear();
        Ok(())
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send_mail(
        &self,
        subject: &str,
        body: &str,
        from_email: &str,
        recipients: &[String],
    ) -> Result<()> {
        self.outbox.lock()?.push(SentMail {
            subject: subject.to_string(),
            body: body.to_string(),
            from_email: from_email.to_string(),
            recipients: recipients.to_vec(),
        });
        Ok(())
    }
}
