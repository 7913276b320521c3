use async_trait::async_trait;
use memoforms::core::{Column, DataType, FormError, Result, Value};
use memoforms::fields::{FieldKind, FieldSpec};
use memoforms::forms::OwnerRef;
use memoforms::mail::Mailer;
use memoforms::storage::TableSchema;
use memoforms::{
    EmailHandler, FormData, FormEngine, FormsConfig, HandlerSpec, MemoryMailer, SubmissionOutcome,
};
use std::sync::Arc;

struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send_mail(
        &self,
        _subject: &str,
        _body: &str,
        _from_email: &str,
        _recipients: &[String],
    ) -> Result<()> {
        Err(FormError::Dispatch("connection refused".into()))
    }
}

fn article() -> TableSchema {
    TableSchema::new(
        "article",
        vec![
            Column::auto_id("id"),
            Column::new("title", DataType::Text).not_null(),
            Column::new("views", DataType::Integer).not_null(),
        ],
    )
}

/// A model form with a save handler at order 0 and an email handler at
/// order 1.
async fn article_engine(mailer: Arc<dyn Mailer>) -> (FormEngine, OwnerRef) {
    let config = FormsConfig::default().default_from_email("forms@example.com");
    let engine = FormEngine::new(config, mailer).await.unwrap();
    engine.register_model(article()).await.unwrap();

    let owner = engine
        .create_model_form("Article", "article")
        .await
        .unwrap();
    engine
        .add_field(owner, FieldSpec::new(FieldKind::Char, "title", "Title").order(0))
        .await
        .unwrap();
    engine
        .add_field(owner, FieldSpec::new(FieldKind::Integer, "views", "Views").order(1))
        .await
        .unwrap();
    engine
        .add_handler(
            owner,
            HandlerSpec::email(
                "notify",
                EmailHandler::new(
                    "Article saved",
                    "editor@example.com,owner@example.com",
                    "{{ title }} has {{ views }} views",
                ),
            )
            .order(1),
        )
        .await
        .unwrap();
    engine
        .add_handler(owner, HandlerSpec::save_instance("save").order(0))
        .await
        .unwrap();
    (engine, owner)
}

fn submission(title: &str, views: &str) -> FormData {
    FormData::new().with("title", title).with("views", views)
}

async fn article_rows(engine: &FormEngine) -> Vec<(u64, Vec<Value>)> {
    engine.storage().scan_table("article").await.unwrap()
}

#[tokio::test]
async fn test_submission_runs_every_handler() {
    let mailer = Arc::new(MemoryMailer::new());
    let (engine, owner) = article_engine(mailer.clone()).await;

    let outcome = engine
        .submit(owner, submission("Rust forms", "12"))
        .await
        .unwrap();
    assert_eq!(outcome, SubmissionOutcome::Handled { instance_id: Some(1) });

    let rows = article_rows(&engine).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1[1], Value::from("Rust forms"));
    assert_eq!(rows[0].1[2], Value::Integer(12));

    let outbox = mailer.outbox().unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].subject, "Article saved");
    assert_eq!(outbox[0].body, "Rust forms has 12 views");
    assert_eq!(outbox[0].from_email, "forms@example.com");
    assert_eq!(
        outbox[0].recipients,
        vec!["editor@example.com".to_string(), "owner@example.com".to_string()]
    );
}

#[tokio::test]
async fn test_handlers_follow_order_not_insertion() {
    let mailer = Arc::new(MemoryMailer::new());
    let (engine, owner) = article_engine(mailer).await;

    let definition = engine.load_form(owner).await.unwrap();
    let names: Vec<&str> = definition
        .handlers()
        .iter()
        .map(|record| record.base().name.as_str())
        .collect();
    assert_eq!(names, vec!["save", "notify"]);
    assert!(definition.handlers().iter().all(|record| !record.is_resolved()));
}

#[tokio::test]
async fn test_submit_instance_updates_in_place() {
    let mailer = Arc::new(MemoryMailer::new());
    let (engine, owner) = article_engine(mailer.clone()).await;
    engine
        .submit(owner, submission("Draft", "0"))
        .await
        .unwrap();

    let outcome = engine
        .submit_instance(owner, submission("Final", "5"), 1)
        .await
        .unwrap();
    assert_eq!(outcome, SubmissionOutcome::Handled { instance_id: Some(1) });

    let rows = article_rows(&engine).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].1[1], Value::from("Final"));
    assert_eq!(mailer.outbox().unwrap().len(), 2);

    let missing = engine
        .submit_instance(owner, submission("Ghost", "1"), 99)
        .await;
    assert!(matches!(missing, Err(FormError::NotFound { .. })));
}

#[tokio::test]
async fn test_invalid_submission_touches_nothing() {
    let mailer = Arc::new(MemoryMailer::new());
    let (engine, owner) = article_engine(mailer.clone()).await;

    let outcome = engine
        .submit(owner, submission("", "lots"))
        .await
        .unwrap();
    let SubmissionOutcome::Invalid(errors) = outcome else {
        panic!("expected field errors");
    };
    assert_eq!(
        errors.get("title"),
        Some(&vec!["This field is required.".to_string()])
    );
    assert_eq!(
        errors.get("views"),
        Some(&vec!["Enter a whole number.".to_string()])
    );
    assert!(article_rows(&engine).await.is_empty());
    assert!(mailer.outbox().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_handler_keeps_earlier_effects() {
    let (engine, owner) = article_engine(Arc::new(FailingMailer)).await;

    let result = engine.submit(owner, submission("Kept", "3")).await;
    assert!(matches!(result, Err(FormError::Dispatch(_))));
    assert_eq!(article_rows(&engine).await.len(), 1);
}

#[tokio::test]
async fn test_atomic_submission_rolls_back_on_failure() {
    let (engine, owner) = article_engine(Arc::new(FailingMailer)).await;

    let result = engine.submit_atomic(owner, submission("Dropped", "3")).await;
    assert!(matches!(result, Err(FormError::Dispatch(_))));
    assert!(article_rows(&engine).await.is_empty());

    // Definitions survive the rollback.
    let definition = engine.load_form(owner).await.unwrap();
    assert_eq!(definition.fields().len(), 2);
    assert_eq!(definition.handlers().len(), 2);
}

#[tokio::test]
async fn test_atomic_submission_commits_on_success() {
    let mailer = Arc::new(MemoryMailer::new());
    let (engine, owner) = article_engine(mailer.clone()).await;

    let outcome = engine
        .submit_atomic(owner, submission("Stored", "8"))
        .await
        .unwrap();
    assert_eq!(outcome, SubmissionOutcome::Handled { instance_id: Some(1) });
    assert_eq!(article_rows(&engine).await.len(), 1);
    assert_eq!(mailer.outbox().unwrap().len(), 1);
}

#[tokio::test]
async fn test_handler_update_and_removal() {
    let mailer = Arc::new(MemoryMailer::new());
    let (engine, owner) = article_engine(mailer.clone()).await;
    let definition = engine.load_form(owner).await.unwrap();
    let notify_id = definition.handlers()[1].base().id.unwrap();
    let save_id = definition.handlers()[0].base().id.unwrap();

    engine
        .update_handler(
            notify_id,
            HandlerSpec::email(
                "notify",
                EmailHandler::new("Changed", "editor@example.com", "{{ title }}"),
            )
            .order(1),
        )
        .await
        .unwrap();

    let broken = engine
        .update_handler(
            notify_id,
            HandlerSpec::email("notify", EmailHandler::new("Changed", "", "{{ title }}")).order(1),
        )
        .await;
    assert!(matches!(broken, Err(FormError::Validation(_))));

    engine.remove_handler(save_id).await.unwrap();
    let outcome = engine
        .submit(owner, submission("Mail only", "1"))
        .await
        .unwrap();
    assert_eq!(outcome, SubmissionOutcome::Handled { instance_id: None });
    assert!(article_rows(&engine).await.is_empty());

    let outbox = mailer.outbox().unwrap();
    assert_eq!(outbox[0].subject, "Changed");
    assert_eq!(outbox[0].body, "Mail only");
}

#[tokio::test]
async fn test_blank_optional_field_takes_column_default() {
    let engine = FormEngine::new(FormsConfig::default(), Arc::new(MemoryMailer::new()))
        .await
        .unwrap();
    engine
        .register_model(TableSchema::new(
            "post",
            vec![
                Column::auto_id("id"),
                Column::new("title", DataType::Text).not_null(),
                Column::new("views", DataType::Integer)
                    .not_null()
                    .default_value(0i64),
            ],
        ))
        .await
        .unwrap();
    let owner = engine.create_model_form("Post", "post").await.unwrap();
    engine
        .add_field(owner, FieldSpec::new(FieldKind::Char, "title", "Title").order(0))
        .await
        .unwrap();
    engine
        .add_field(owner, FieldSpec::new(FieldKind::Integer, "views", "Views").order(1))
        .await
        .unwrap();
    engine
        .add_handler(owner, HandlerSpec::save_instance("save"))
        .await
        .unwrap();

    let class = engine.form_class(owner).await.unwrap();
    assert!(!class.field("views").unwrap().required);

    let outcome = engine
        .submit(owner, FormData::new().with("title", "Hi").with("views", ""))
        .await
        .unwrap();
    assert_eq!(outcome, SubmissionOutcome::Handled { instance_id: Some(1) });

    let rows = engine.storage().scan_table("post").await.unwrap();
    assert_eq!(rows[0].1, vec![Value::Integer(1), Value::from("Hi"), Value::Integer(0)]);
}
