use memoforms::core::{Column, DataType, FormError};
use memoforms::fields::{FieldClass, FieldKind, FieldSpec};
use memoforms::forms::OwnerRef;
use memoforms::storage::TableSchema;
use memoforms::widgets::ids;
use memoforms::{FormEngine, FormsConfig, HandlerSpec, MemoryMailer};
use std::sync::Arc;

fn article() -> TableSchema {
    TableSchema::new(
        "article",
        vec![
            Column::auto_id("id"),
            Column::new("title", DataType::Text).not_null(),
            Column::new("views", DataType::Integer).not_null(),
            Column::new("notes", DataType::Text),
            Column::new("rating", DataType::Integer)
                .not_null()
                .default_value(3i64),
        ],
    )
}

async fn engine() -> FormEngine {
    let engine = FormEngine::new(FormsConfig::default(), Arc::new(MemoryMailer::new()))
        .await
        .unwrap();
    engine.register_model(article()).await.unwrap();
    engine
}

async fn article_form(engine: &FormEngine) -> OwnerRef {
    engine
        .create_model_form("Edit article", "article")
        .await
        .unwrap()
}

#[tokio::test]
async fn test_suggestions_shrink_as_fields_are_added() {
    let engine = engine().await;
    let owner = article_form(&engine).await;

    let definition = engine.load_form(owner).await.unwrap();
    let names: Vec<String> = definition
        .suggested_model_field_choices()
        .unwrap()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(names, vec!["title", "views", "notes", "rating"]);

    engine
        .add_field(owner, FieldSpec::new(FieldKind::Char, "title", "Title").order(0))
        .await
        .unwrap();
    let definition = engine.load_form(owner).await.unwrap();
    assert_eq!(
        definition.suggested_model_field_choices().unwrap()[0],
        ("views".to_string(), "views".to_string())
    );
    assert_eq!(
        definition.required_field_names().unwrap(),
        vec!["title", "views"]
    );
}

#[tokio::test]
async fn test_save_instance_needs_every_required_field() {
    let engine = engine().await;
    let owner = article_form(&engine).await;
    engine
        .add_field(owner, FieldSpec::new(FieldKind::Char, "notes", "Notes").order(0))
        .await
        .unwrap();

    let err = engine
        .add_handler(owner, HandlerSpec::save_instance("save"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "The save instance handler can only be attached to forms that contain fields for all required model fields.  The form you are attempting to attach this handler to is missing the following fields: (title, views)"
    );

    engine
        .add_field(owner, FieldSpec::new(FieldKind::Char, "title", "Title").order(1))
        .await
        .unwrap();
    engine
        .add_field(owner, FieldSpec::new(FieldKind::Integer, "views", "Views").order(2))
        .await
        .unwrap();
    let stored = engine
        .add_handler(owner, HandlerSpec::save_instance("save"))
        .await
        .unwrap();
    assert!(stored.id().is_some());
}

#[tokio::test]
async fn test_save_instance_rejects_free_forms() {
    let engine = engine().await;
    let owner = engine.create_form("Contact").await.unwrap();
    let err = engine
        .add_handler(owner, HandlerSpec::save_instance("save"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "This handler can only be attached to model forms"
    );
}

#[tokio::test]
async fn test_model_form_class_follows_model_columns() {
    let engine = engine().await;
    let owner = article_form(&engine).await;
    engine
        .add_field(
            owner,
            FieldSpec::new(FieldKind::Char, "title", "Headline")
                .help_text("Shown on the front page")
                .order(0),
        )
        .await
        .unwrap();
    engine
        .add_field(
            owner,
            FieldSpec::new(FieldKind::Char, "notes", "Notes")
                .widget(ids::TEXTAREA)
                .order(1),
        )
        .await
        .unwrap();
    engine
        .add_field(owner, FieldSpec::new(FieldKind::Integer, "views", "Views").order(2))
        .await
        .unwrap();

    let class = engine.form_class(owner).await.unwrap();
    assert_eq!(class.name(), "ModelFormEditArticle");
    assert_eq!(class.field_names(), vec!["title", "notes", "views"]);
    assert_eq!(class.model().map(TableSchema::name), Some("article"));

    let title = class.field("title").unwrap();
    assert!(title.required);
    assert_eq!(title.help_text.as_deref(), Some("Shown on the front page"));

    let notes = class.field("notes").unwrap();
    assert!(!notes.required);
    assert_eq!(notes.widget.identifier(), ids::TEXTAREA);

    assert_eq!(class.field("views").unwrap().class, FieldClass::Integer);

    let html = engine.preview(owner).await.unwrap();
    assert!(html.contains("<label for=\"id_title\">Headline:</label>"));
    assert!(html.contains("textarea"));
}

#[tokio::test]
async fn test_field_order_and_names_are_unique_per_form() {
    let engine = engine().await;
    let owner = engine.create_form("Contact").await.unwrap();
    engine
        .add_field(owner, FieldSpec::new(FieldKind::Char, "name", "Name").order(0))
        .await
        .unwrap();

    let duplicate_order = engine
        .add_field(owner, FieldSpec::new(FieldKind::Email, "email", "Email").order(0))
        .await;
    assert!(matches!(duplicate_order, Err(FormError::Validation(_))));

    let duplicate_name = engine
        .add_field(owner, FieldSpec::new(FieldKind::Email, "name", "Email").order(1))
        .await;
    assert!(matches!(duplicate_name, Err(FormError::Validation(_))));

    // Another form may reuse both.
    let other = engine.create_form("Feedback").await.unwrap();
    engine
        .add_field(other, FieldSpec::new(FieldKind::Char, "name", "Name").order(0))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_field_spec_validation_happens_before_storage() {
    let engine = engine().await;
    let owner = engine.create_form("Contact").await.unwrap();
    let writes = engine.storage().stats().writes;

    let wrong_widget = engine
        .add_field(
            owner,
            FieldSpec::new(FieldKind::Integer, "age", "Age").widget(ids::CHECKBOX_INPUT),
        )
        .await;
    assert!(matches!(wrong_widget, Err(FormError::Validation(_))));

    let unknown_model = engine
        .add_field(
            owner,
            FieldSpec::new(FieldKind::ForeignKey, "author", "Author").related_type("author"),
        )
        .await;
    assert!(unknown_model.is_err());

    assert_eq!(engine.storage().stats().writes, writes);
}

#[tokio::test]
async fn test_update_field_edits_presentation() {
    let engine = engine().await;
    let owner = engine.create_form("Contact").await.unwrap();
    let stored = engine
        .add_field(owner, FieldSpec::new(FieldKind::Char, "name", "Name"))
        .await
        .unwrap();
    let id = stored.id().unwrap();

    engine
        .update_field(
            id,
            FieldSpec::new(FieldKind::Char, "name", "Full name")
                .required(true)
                .widget(ids::TEXTAREA),
        )
        .await
        .unwrap();
    let class = engine.form_class(owner).await.unwrap();
    let field = class.field("name").unwrap();
    assert_eq!(field.label, "Full name");
    assert!(field.required);

    let retyped = engine
        .update_field(id, FieldSpec::new(FieldKind::Email, "name", "Name"))
        .await;
    assert!(matches!(retyped, Err(FormError::Validation(_))));
}

#[tokio::test]
async fn test_rename_list_and_delete_forms() {
    let engine = engine().await;
    let contact = engine.create_form("Contact").await.unwrap();
    let edit = article_form(&engine).await;
    engine
        .add_field(contact, FieldSpec::new(FieldKind::Char, "name", "Name"))
        .await
        .unwrap();

    engine.rename_form(contact, "Contact us").await.unwrap();
    let listing: Vec<String> = engine
        .list_forms()
        .await
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        listing,
        vec![
            format!("{} Contact us", contact),
            format!("{} Edit article [article]", edit),
        ]
    );

    engine.delete_form(contact).await.unwrap();
    assert!(engine.load_form(contact).await.is_err());
    assert_eq!(engine.list_forms().await.unwrap().len(), 1);
    assert!(
        engine
            .storage()
            .scan_table("memoforms_field_char")
            .await
            .unwrap()
            .is_empty()
    );
}
