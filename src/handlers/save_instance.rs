use super::HandlerContext;
use crate::core::{FormError, Result, Value};
use crate::forms::{BoundForm, RowChange};
use crate::forms::definition::{FormDefinition, FormKind};
use std::collections::HashMap;

pub const MODEL_FORMS_ONLY: &str = "This handler can only be attached to model forms";

/// Persists the submitted model instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveInstanceHandler;

impl SaveInstanceHandler {
    /// The owning form must be model-bound and name every required model
    /// column.
    pub fn clean(&self, definition: &FormDefinition) -> Result<()> {
        if !matches!(definition.kind(), FormKind::ModelBound(_)) {
            return Err(FormError::validation(MODEL_FORMS_ONLY));
        }

        let used = definition.used_field_names();
        let missing: Vec<String> = definition
            .required_field_names()?
            .into_iter()
            .filter(|name| !used.contains(name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(FormError::validation(format!(
                "The save instance handler can only be attached to forms that contain fields for all required model fields.  The form you are attempting to attach this handler to is missing the following fields: ({})",
                missing.join(", ")
            )))
        }
    }

    pub async fn handle(&self, form: &BoundForm<'_>, ctx: &HandlerContext<'_>) -> Result<()> {
        let model = form
            .class()
            .model()
            .ok_or_else(|| FormError::validation(MODEL_FORMS_ONLY))?;

        let values: HashMap<String, Value> = model
            .columns()
            .iter()
            .filter(|column| !column.primary_key)
            .filter_map(|column| {
                let value = form.cleaned_data().get(&column.name)?;
                // A blank optional field leaves the column default in place.
                if value.is_null() && column.has_default() {
                    return None;
                }
                Some((column.name.clone(), value.clone()))
            })
            .collect();

        match form.instance_id() {
            Some(id) => {
                let previous = ctx
                    .storage
                    .get_row(model.name(), id)
                    .await?
                    .ok_or(FormError::NotFound {
                        kind: "model instance",
                        id,
                    })?;
                if !ctx.storage.update_values(model.name(), id, &values).await? {
                    return Err(FormError::NotFound {
                        kind: "model instance",
                        id,
                    });
                }
                form.record_change(RowChange::Updated {
                    table: model.name().to_string(),
                    id,
                    previous,
                })?;
                log::info!("Updated {} instance {}", model.name(), id);
                form.mark_saved(id);
            }
            None => {
                let id = ctx.storage.insert_values(model.name(), &values).await?;
                form.record_change(RowChange::Inserted {
                    table: model.name().to_string(),
                    id,
                })?;
                log::info!("Created {} instance {}", model.name(), id);
                form.mark_saved(id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};
    use crate::fields::{FieldKind, FieldSpec};
    use crate::storage::TableSchema;

    fn model() -> TableSchema {
        TableSchema::new(
            "omni_test_model",
            vec![
                Column::auto_id("id"),
                Column::new("title", DataType::Text).not_null(),
                Column::new("agree", DataType::Boolean).not_null(),
                Column::new("bar", DataType::Text).not_null(),
                Column::new("baz", DataType::Integer).not_null(),
                Column::new("notes", DataType::Text),
                Column::new("score", DataType::Integer)
                    .not_null()
                    .default_value(0i64),
            ],
        )
    }

    #[test]
    fn test_clean_requires_model_form() {
        let definition = FormDefinition::free(1, "Free");
        let err = SaveInstanceHandler.clean(&definition).unwrap_err();
        assert_eq!(err.to_string(), MODEL_FORMS_ONLY);
    }

    #[test]
    fn test_clean_lists_missing_required_fields_in_order() {
        let definition = FormDefinition::model_bound(1, "Model", model()).with_fields(vec![
            FieldSpec::new(FieldKind::Char, "title", "Title").order(0),
            FieldSpec::new(FieldKind::Boolean, "agree", "Agree").order(1),
        ]);
        let err = SaveInstanceHandler.clean(&definition).unwrap_err();
        assert!(matches!(err, FormError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "The save instance handler can only be attached to forms that contain fields for all required model fields.  The form you are attempting to attach this handler to is missing the following fields: (bar, baz)"
        );
    }

    #[test]
    fn test_clean_accepts_complete_model_form() {
        let definition = FormDefinition::model_bound(1, "Model", model()).with_fields(vec![
            FieldSpec::new(FieldKind::Char, "title", "Title").order(0),
            FieldSpec::new(FieldKind::Boolean, "agree", "Agree").order(1),
            FieldSpec::new(FieldKind::Char, "bar", "Bar").order(2),
            FieldSpec::new(FieldKind::Integer, "baz", "Baz").order(3),
        ]);
        assert!(SaveInstanceHandler.clean(&definition).is_ok());
    }
}
