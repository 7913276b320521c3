use memoforms::core::{Column, DataType, Value};
use memoforms::fields::{FieldKind, FieldRecord, FieldSpec};
use memoforms::forms::OwnerRef;
use memoforms::storage::TableSchema;
use memoforms::{FormEngine, FormsConfig, MemoryMailer};
use std::sync::Arc;

async fn setup() -> (FormEngine, OwnerRef) {
    let engine = FormEngine::new(FormsConfig::default(), Arc::new(MemoryMailer::new()))
        .await
        .unwrap();
    engine
        .register_model(TableSchema::new(
            "category",
            vec![
                Column::auto_id("id"),
                Column::new("label", DataType::Text).not_null(),
            ],
        ))
        .await
        .unwrap();

    let owner = engine.create_form("Survey").await.unwrap();
    let specs = vec![
        FieldSpec::new(FieldKind::Char, "name", "Name")
            .required(true)
            .initial("Anon")
            .order(0),
        FieldSpec::new(FieldKind::Integer, "age", "Age")
            .initial(18i64)
            .order(1),
        FieldSpec::new(FieldKind::Choice, "colour", "Colour")
            .choices("red\ngreen\nblue")
            .order(2),
        FieldSpec::new(FieldKind::ForeignKey, "category", "Category")
            .related_type("category")
            .order(3),
    ];
    for spec in specs {
        engine.add_field(owner, spec).await.unwrap();
    }
    (engine, owner)
}

#[tokio::test]
async fn test_real_type_is_stamped_on_save() {
    let (engine, owner) = setup().await;
    let records = engine.repository().field_records(owner).await.unwrap();

    let kinds: Vec<_> = records
        .iter()
        .map(|record| record.base().real_type)
        .collect();
    assert_eq!(
        kinds,
        vec![
            Some(FieldKind::Char),
            Some(FieldKind::Integer),
            Some(FieldKind::Choice),
            Some(FieldKind::ForeignKey),
        ]
    );
}

#[tokio::test]
async fn test_specific_resolves_the_stored_variant() {
    let (engine, owner) = setup().await;
    let records = engine.repository().field_records(owner).await.unwrap();
    let storage = engine.storage();

    let age = &records[1];
    assert!(!age.is_resolved());
    let spec = age.specific(storage).await.unwrap();
    assert_eq!(spec.kind(), FieldKind::Integer);
    assert_eq!(spec.initial_value(), &Value::Integer(18));
    assert!(age.is_resolved());

    let colour = records[2].specific(storage).await.unwrap();
    assert_eq!(
        colour.choice_pairs(),
        vec![
            ("red".to_string(), "red".to_string()),
            ("green".to_string(), "green".to_string()),
            ("blue".to_string(), "blue".to_string()),
        ]
    );

    let category = records[3].specific(storage).await.unwrap();
    assert_eq!(category.related_table(), Some("category"));
}

#[tokio::test]
async fn test_specific_costs_one_lookup_and_is_cached() {
    let (engine, owner) = setup().await;
    let records = engine.repository().field_records(owner).await.unwrap();
    let storage = engine.storage();
    let record = &records[0];

    let before = storage.stats().row_lookups;
    let first = record.specific(storage).await.unwrap().clone();
    assert_eq!(storage.stats().row_lookups, before + 1);

    let second = record.specific(storage).await.unwrap();
    assert_eq!(storage.stats().row_lookups, before + 1);
    assert_eq!(&first, second);
}

#[tokio::test]
async fn test_fresh_record_resolves_identically() {
    let (engine, owner) = setup().await;
    let storage = engine.storage();
    let records = engine.repository().field_records(owner).await.unwrap();
    let id = records[0].base().id.unwrap();

    let fresh = engine.repository().field_record(id).await.unwrap();
    assert_eq!(
        fresh.specific(storage).await.unwrap(),
        records[0].specific(storage).await.unwrap()
    );
}

#[tokio::test]
async fn test_record_built_from_spec_is_already_resolved() {
    let (engine, _) = setup().await;
    let record = FieldRecord::from(FieldSpec::new(FieldKind::Email, "email", "Email"));
    assert!(record.is_resolved());

    let before = engine.storage().stats().row_lookups;
    let spec = record.specific(engine.storage()).await.unwrap();
    assert_eq!(spec.kind(), FieldKind::Email);
    assert_eq!(engine.storage().stats().row_lookups, before);
}

#[tokio::test]
async fn test_missing_variant_row_is_reported() {
    let (engine, owner) = setup().await;
    let records = engine.repository().field_records(owner).await.unwrap();
    let id = records[1].base().id.unwrap();

    engine
        .storage()
        .delete_row(&FieldKind::Integer.variant_table(), id)
        .await
        .unwrap();

    let fresh = engine.repository().field_record(id).await.unwrap();
    assert!(fresh.specific(engine.storage()).await.is_err());
    assert!(!fresh.is_resolved());
}
