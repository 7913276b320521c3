// ============================================================================
// memoforms Library
// ============================================================================

pub mod config;
pub mod core;
pub mod facade;
pub mod fields;
pub mod forms;
pub mod handlers;
pub mod mail;
pub mod repository;
pub mod storage;
pub mod widgets;

// Re-export main types for convenience
pub use config::FormsConfig;
pub use core::{Column, DataType, FormError, Result, Value};
pub use facade::{FormEngine, SubmissionOutcome};
pub use fields::{FieldKind, FieldSpec, resolve_variant};
pub use forms::{BoundForm, FormClass, FormData, FormDefinition, OwnerRef, SubmissionState};
pub use handlers::{EmailHandler, HandlerContext, HandlerSpec};
pub use mail::{LogMailer, Mailer, MemoryMailer};
pub use repository::FormRepository;
pub use storage::{InMemoryStorage, TableSchema};
pub use widgets::WidgetRegistry;

/// Builds a contact form, submits it and reads the notification.
///
/// ```
/// use memoforms::{
///     EmailHandler, FieldKind, FieldSpec, FormData, FormEngine, FormsConfig, HandlerSpec,
///     MemoryMailer, SubmissionOutcome,
/// };
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> memoforms::Result<()> {
/// let mailer = Arc::new(MemoryMailer::new());
/// let engine = FormEngine::new(FormsConfig::default(), mailer.clone()).await?;
///
/// let contact = engine.create_form("Contact").await?;
/// engine
///     .add_field(contact, FieldSpec::new(FieldKind::Char, "user", "Name").required(true))
///     .await?;
/// engine
///     .add_handler(
///         contact,
///         HandlerSpec::email("notify", EmailHandler::new("New contact", "staff@example.com", "Hello {{ user }}")),
///     )
///     .await?;
///
/// let outcome = engine.submit(contact, FormData::new().with("user", "Bob")).await?;
/// assert_eq!(outcome, SubmissionOutcome::Handled { instance_id: None });
/// assert_eq!(mailer.outbox()?[0].body, "Hello Bob");
/// # Ok(())
/// # }
/// ```
pub fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
