//! The admin and request-time entry point.

use crate::config::FormsConfig;
use crate::core::{FormError, Result};
use crate::fields::FieldSpec;
use crate::forms::{FormClass, FormData, FormDefinition, OwnerRef};
use crate::handlers::{HandlerContext, HandlerSpec};
use crate::mail::Mailer;
use crate::repository::{FormRepository, FormSummary};
use crate::storage::{InMemoryStorage, StorageSnapshot, TableSchema};
use crate::widgets::WidgetRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Field errors; no handler ran.
    Invalid(BTreeMap<String, Vec<String>>),
    /// Every handler ran. Carries the saved instance of model forms.
    Handled { instance_id: Option<u64> },
}

pub struct FormEngine {
    storage: Arc<InMemoryStorage>,
    widgets: Arc<WidgetRegistry>,
    mailer: Arc<dyn Mailer>,
    config: FormsConfig,
    repository: FormRepository,
}

impl FormEngine {
    /// Engine with the built-in widgets and empty storage.
    pub async fn new(config: FormsConfig, mailer: Arc<dyn Mailer>) -> Result<Self> {
        Self::with_widgets(config, mailer, WidgetRegistry::with_default_widgets()).await
    }

    pub async fn with_widgets(
        config: FormsConfig,
        mailer: Arc<dyn Mailer>,
        widgets: WidgetRegistry,
    ) -> Result<Self> {
        let storage = Arc::new(InMemoryStorage::new());
        let widgets = Arc::new(widgets);
        let repository = FormRepository::new(storage.clone(), widgets.clone());
        repository.bootstrap().await?;

        Ok(Self {
            storage,
            widgets,
            mailer,
            config,
            repository,
        })
    }

    /// Like [`new`](Self::new), restoring the configured snapshot when the
    /// file exists.
    pub async fn open(config: FormsConfig, mailer: Arc<dyn Mailer>) -> Result<Self> {
        let engine = Self::new(config, mailer).await?;

        if let Some(path) = engine.config.snapshot_path.as_ref()
            && path.exists()
        {
            let snapshot = StorageSnapshot::read_from(path)?;
            log::info!(
                "Restoring {} tables ({} rows) from {}",
                snapshot.metadata.table_count,
                snapshot.metadata.row_count,
                path.display()
            );
            engine.storage.restore_tables(snapshot.tables).await;
            engine.repository.bootstrap().await?;
        }

        Ok(engine)
    }

    pub fn config(&self) -> &FormsConfig {
        &self.config
    }

    pub fn storage(&self) -> &InMemoryStorage {
        &self.storage
    }

    pub fn widgets(&self) -> &WidgetRegistry {
        &self.widgets
    }

    pub fn repository(&self) -> &FormRepository {
        &self.repository
    }

    pub fn context(&self) -> HandlerContext<'_> {
        HandlerContext {
            storage: &self.storage,
            mailer: self.mailer.as_ref(),
            config: &self.config,
        }
    }

    pub async fn save_snapshot(&self) -> Result<()> {
        let path = self.config.snapshot_path.as_ref().ok_or_else(|| {
            FormError::configuration("No snapshot path configured")
        })?;
        StorageSnapshot::new(self.storage.get_all_tables().await).write_to(path)
    }

    async fn autosave(&self) -> Result<()> {
        if self.config.autosave && self.config.snapshot_path.is_some() {
            self.save_snapshot().await?;
        }
        Ok(())
    }

    pub async fn register_model(&self, schema: TableSchema) -> Result<()> {
        self.repository.register_model(schema).await?;
        self.autosave().await
    }

    pub async fn create_form(&self, title: &str) -> Result<OwnerRef> {
        let owner = self.repository.create_form(title).await?;
        self.autosave().await?;
        Ok(owner)
    }

    pub async fn create_model_form(&self, title: &str, content_type: &str) -> Result<OwnerRef> {
        let owner = self.repository.create_model_form(title, content_type).await?;
        self.autosave().await?;
        Ok(owner)
    }

    pub async fn rename_form(&self, owner: OwnerRef, title: &str) -> Result<()> {
        self.repository.rename_form(owner, title).await?;
        self.autosave().await
    }

    pub async fn delete_form(&self, owner: OwnerRef) -> Result<()> {
        self.repository.delete_form(owner).await?;
        self.autosave().await
    }

    pub async fn list_forms(&self) -> Result<Vec<FormSummary>> {
        self.repository.list_forms().await
    }

    pub async fn load_form(&self, owner: OwnerRef) -> Result<FormDefinition> {
        self.repository.load_form(owner).await
    }

    pub async fn add_field(&self, owner: OwnerRef, spec: FieldSpec) -> Result<FieldSpec> {
        let spec = self.repository.add_field(owner, spec).await?;
        self.autosave().await?;
        Ok(spec)
    }

    pub async fn update_field(&self, id: u64, spec: FieldSpec) -> Result<FieldSpec> {
        let spec = self.repository.update_field(id, spec).await?;
        self.autosave().await?;
        Ok(spec)
    }

    pub async fn remove_field(&self, id: u64) -> Result<()> {
        self.repository.remove_field(id).await?;
        self.autosave().await
    }

    pub async fn add_handler(&self, owner: OwnerRef, spec: HandlerSpec) -> Result<HandlerSpec> {
        let spec = self.repository.add_handler(owner, spec).await?;
        self.autosave().await?;
        Ok(spec)
    }

    pub async fn update_handler(&self, id: u64, spec: HandlerSpec) -> Result<HandlerSpec> {
        let spec = self.repository.update_handler(id, spec).await?;
        self.autosave().await?;
        Ok(spec)
    }

    pub async fn remove_handler(&self, id: u64) -> Result<()> {
        self.repository.remove_handler(id).await?;
        self.autosave().await
    }

    /// Loads the definition and synthesizes its form class.
    pub async fn form_class(&self, owner: OwnerRef) -> Result<FormClass> {
        let definition = self.repository.load_form(owner).await?;
        definition
            .build_form_class(&self.widgets, &self.storage)
            .await
    }

    /// Renders the unbound form without storing anything.
    pub async fn preview(&self, owner: OwnerRef) -> Result<String> {
        Ok(self.form_class(owner).await?.as_p())
    }

    /// Validates a submission and runs the handler chain on success.
    pub async fn submit(&self, owner: OwnerRef, data: FormData) -> Result<SubmissionOutcome> {
        self.process(owner, data, None, false).await
    }

    /// Like [`submit`](Self::submit), reverting the rows this submission
    /// wrote if a handler fails.
    pub async fn submit_atomic(&self, owner: OwnerRef, data: FormData) -> Result<SubmissionOutcome> {
        self.process(owner, data, None, true).await
    }

    /// Submission that edits an existing model instance.
    pub async fn submit_instance(
        &self,
        owner: OwnerRef,
        data: FormData,
        instance_id: u64,
    ) -> Result<SubmissionOutcome> {
        self.process(owner, data, Some(instance_id), false).await
    }

    async fn process(
        &self,
        owner: OwnerRef,
        data: FormData,
        instance_id: Option<u64>,
        atomic: bool,
    ) -> Result<SubmissionOutcome> {
        let class = self.form_class(owner).await?;
        let mut form = match instance_id {
            Some(id) => class.bind_instance(data, id),
            None => class.bind(data),
        };

        if !form.is_valid() {
            return Ok(SubmissionOutcome::Invalid(form.errors().clone()));
        }

        let ctx = self.context();
        if atomic {
            form.handle_atomic(&ctx).await?;
        } else {
            form.handle(&ctx).await?;
        }
        Ok(SubmissionOutcome::Handled {
            instance_id: form.instance_id(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldKind;
    use crate::mail::MemoryMailer;

    #[tokio::test]
    async fn test_preview_does_not_write() {
        let engine = FormEngine::new(FormsConfig::default(), Arc::new(MemoryMailer::new()))
            .await
            .unwrap();
        let owner = engine.create_form("Contact").await.unwrap();
        engine
            .add_field(
                owner,
                FieldSpec::new(FieldKind::Char, "name", "Your name").required(true),
            )
            .await
            .unwrap();

        let writes = engine.storage().stats().writes;
        let html = engine.preview(owner).await.unwrap();
        assert!(html.contains("Your name"));
        assert_eq!(engine.storage().stats().writes, writes);
    }

    #[tokio::test]
    async fn test_save_snapshot_needs_a_path() {
        let engine = FormEngine::new(FormsConfig::default(), Arc::new(MemoryMailer::new()))
            .await
            .unwrap();
        assert!(matches!(
            engine.save_snapshot().await,
            Err(FormError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_submission_runs_no_handler() {
        let mailer = Arc::new(MemoryMailer::new());
        let engine = FormEngine::new(FormsConfig::default(), mailer.clone())
            .await
            .unwrap();
        let owner = engine.create_form("Contact").await.unwrap();
        engine
            .add_field(owner, FieldSpec::new(FieldKind::Email, "email", "Email").required(true))
            .await
            .unwrap();
        engine
            .add_handler(
                owner,
                HandlerSpec::email(
                    "notify",
                    crate::handlers::EmailHandler::new("New", "admin@example.com", "{{ email }}"),
                ),
            )
            .await
            .unwrap();

        let outcome = engine
            .submit(owner, FormData::new().with("email", "nope"))
            .await
            .unwrap();
        assert!(matches!(outcome, SubmissionOutcome::Invalid(errors) if errors.contains_key("email")));
        assert!(mailer.outbox().unwrap().is_empty());
    }
}
