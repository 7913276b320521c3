//! Submissions bound to a synthesized form class.

use super::class::FormClass;
use crate::core::{FormError, Result, Row, Value};
use crate::handlers::{HandlerContext, run_chain};
use crate::storage::InMemoryStorage;
use std::collections::BTreeMap;
use std::sync::{Mutex, OnceLock};

/// Submitted values; one name may carry several values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    values: BTreeMap<String, Vec<String>>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value under `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.entry(name.into()).or_default().push(value.into());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.values.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).last().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FormData
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = Self::new();
        for (name, value) in iter {
            data.insert(name, value);
        }
        data
    }
}

/// Lifecycle of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Defined,
    Validated,
    Invalid,
    Handled,
}

/// A row written by a handler during one submission.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange {
    Inserted { table: String, id: u64 },
    Updated { table: String, id: u64, previous: Row },
}

impl RowChange {
    /// Reverts the change; rows touched by nobody else end up as before.
    async fn revert(&self, storage: &InMemoryStorage) -> Result<()> {
        match self {
            RowChange::Inserted { table, id } => {
                storage.delete_row(table, *id).await?;
            }
            RowChange::Updated {
                table,
                id,
                previous,
            } => {
                storage.update_row(table, *id, previous.clone()).await?;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct BoundForm<'a> {
    class: &'a FormClass,
    data: Option<FormData>,
    instance: Option<u64>,
    state: SubmissionState,
    cleaned_data: BTreeMap<String, Value>,
    errors: BTreeMap<String, Vec<String>>,
    saved_instance: OnceLock<u64>,
    changes: Mutex<Vec<RowChange>>,
}

impl<'a> BoundForm<'a> {
    pub(crate) fn new(class: &'a FormClass, data: Option<FormData>, instance: Option<u64>) -> Self {
        Self {
            class,
            data,
            instance,
            state: SubmissionState::Defined,
            cleaned_data: BTreeMap::new(),
            errors: BTreeMap::new(),
            saved_instance: OnceLock::new(),
            changes: Mutex::new(Vec::new()),
        }
    }

    pub fn class(&self) -> &'a FormClass {
        self.class
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn is_bound(&self) -> bool {
        self.data.is_some()
    }

    pub fn cleaned_data(&self) -> &BTreeMap<String, Value> {
        &self.cleaned_data
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    /// The instance this submission edits or created.
    pub fn instance_id(&self) -> Option<u64> {
        self.saved_instance.get().copied().or(self.instance)
    }

    pub(crate) fn mark_saved(&self, id: u64) {
        // A second save within one submission keeps the first id.
        let _ = self.saved_instance.set(id);
    }

    /// Logs a handler write so an atomic run can undo it.
    pub(crate) fn record_change(&self, change: RowChange) -> Result<()> {
        self.changes.lock()?.push(change);
        Ok(())
    }

    /// Handler writes of this submission, oldest first.
    pub fn changes(&self) -> Result<Vec<RowChange>> {
        Ok(self.changes.lock()?.clone())
    }

    /// Cleans every field. Unbound forms stay `Defined`.
    pub fn full_clean(&mut self) -> bool {
        let Some(data) = &self.data else {
            return false;
        };

        let mut cleaned = BTreeMap::new();
        let mut errors = BTreeMap::new();
        for field in self.class.fields() {
            match field.clean(data.get_all(&field.name)) {
                Ok(value) => {
                    cleaned.insert(field.name.clone(), value);
                }
                Err(message) => {
                    errors.insert(field.name.clone(), vec![message]);
                }
            }
        }

        self.cleaned_data = cleaned;
        self.state = if errors.is_empty() {
            SubmissionState::Validated
        } else {
            log::debug!(
                "{} failed validation on: {}",
                self.class.name(),
                errors.keys().cloned().collect::<Vec<_>>().join(", ")
            );
            SubmissionState::Invalid
        };
        self.errors = errors;
        self.state == SubmissionState::Validated
    }

    pub fn is_valid(&mut self) -> bool {
        match self.state {
            SubmissionState::Defined => self.full_clean(),
            SubmissionState::Validated | SubmissionState::Handled => true,
            SubmissionState::Invalid => false,
        }
    }

    fn ensure_validated(&self) -> Result<()> {
        match self.state {
            SubmissionState::Validated => Ok(()),
            SubmissionState::Handled => Err(FormError::validation(format!(
                "{} has already been handled",
                self.class.name()
            ))),
            _ => Err(FormError::validation(format!(
                "{} must validate before its handlers run",
                self.class.name()
            ))),
        }
    }

    /// Runs the handler chain. Effects of handlers that ran before a
    /// failure are kept.
    pub async fn handle(&mut self, ctx: &HandlerContext<'_>) -> Result<()> {
        self.ensure_validated()?;
        let class = self.class;
        let count = run_chain(class.handlers(), self, ctx).await?;
        log::info!("{} handled by {} handler(s)", class.name(), count);
        self.state = SubmissionState::Handled;
        Ok(())
    }

    /// Like [`handle`](Self::handle), but reverts the rows written by this
    /// chain if a handler fails. Writes made by other submissions meanwhile
    /// are kept. Mail already sent stays sent.
    pub async fn handle_atomic(&mut self, ctx: &HandlerContext<'_>) -> Result<()> {
        self.ensure_validated()?;

        match self.handle(ctx).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let changes = std::mem::take(self.changes.get_mut()?);
                log::warn!(
                    "Reverting {} row change(s) of {} after handler failure: {}",
                    changes.len(),
                    self.class.name(),
                    err
                );
                for change in changes.iter().rev() {
                    if let Err(revert_err) = change.revert(ctx.storage).await {
                        log::error!("Failed to revert {:?}: {}", change, revert_err);
                    }
                }
                Err(err)
            }
        }
    }

    /// Save hook of a validated form: runs the handlers.
    pub async fn save(&mut self, ctx: &HandlerContext<'_>) -> Result<Option<u64>> {
        self.handle(ctx).await?;
        Ok(self.instance_id())
    }

    /// HTML paragraphs for every field, with submitted or initial values.
    pub fn as_p(&self) -> String {
        self.class
            .fields()
            .iter()
            .map(|field| {
                let value = self.display_value(&field.name);
                let errors = self
                    .errors
                    .get(&field.name)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                field.as_p(&value, errors)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn display_value(&self, name: &str) -> Value {
        match &self.data {
            Some(data) => {
                let raw = data.get_all(name);
                match raw {
                    [] => Value::Null,
                    [single] => Value::from(single.as_str()),
                    many => Value::List(many.iter().map(|v| Value::from(v.as_str())).collect()),
                }
            }
            None => self.class.initial().get(name).cloned().unwrap_or(Value::Null),
        }
    }
}
