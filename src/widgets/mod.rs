pub mod choice;
pub mod input;

use crate::core::{FormError, Result, Value};
use std::collections::HashMap;
use std::fmt;

pub use choice::{ChoiceList, Select};
pub use input::{CheckboxInput, Input, Textarea};

/// Identifiers of the built-in widgets, as stored on field specifications.
pub mod ids {
    pub const TEXT_INPUT: &str = "text_input";
    pub const TEXTAREA: &str = "textarea";
    pub const PASSWORD_INPUT: &str = "password_input";
    pub const HIDDEN_INPUT: &str = "hidden_input";
    pub const CHECKBOX_INPUT: &str = "checkbox_input";
    pub const DATE_INPUT: &str = "date_input";
    pub const DATETIME_INPUT: &str = "datetime_input";
    pub const TIME_INPUT: &str = "time_input";
    pub const NUMBER_INPUT: &str = "number_input";
    pub const EMAIL_INPUT: &str = "email_input";
    pub const URL_INPUT: &str = "url_input";
    pub const SELECT: &str = "select";
    pub const RADIO_SELECT: &str = "radio_select";
    pub const SELECT_MULTIPLE: &str = "select_multiple";
    pub const CHECKBOX_SELECT_MULTIPLE: &str = "checkbox_select_multiple";
}

/// Per-render attributes of a bound field.
pub struct RenderAttrs<'a> {
    pub id: String,
    pub required: bool,
    pub choices: &'a [(String, String)],
}

/// A renderable HTML input.
pub trait Widget: Send + Sync + fmt::Debug {
    /// Identifier this widget is registered under
    fn identifier(&self) -> &'static str;

    /// Render the widget for `name` holding `value`
    fn render(&self, name: &str, value: &Value, attrs: &RenderAttrs<'_>) -> String;

    /// Does the widget submit several values under one name?
    fn allows_multiple_values(&self) -> bool {
        false
    }
}

type WidgetFactory = Box<dyn Fn() -> Box<dyn Widget> + Send + Sync>;

/// Registry of widget constructors keyed by identifier
pub struct WidgetRegistry {
    factories: HashMap<String, WidgetFactory>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a widget constructor
    pub fn register<F>(&mut self, identifier: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Widget> + Send + Sync + 'static,
    {
        let identifier = identifier.into();
        log::debug!("Registered widget: {}", identifier);
        self.factories.insert(identifier, Box::new(factory));
    }

    /// Registry with every built-in widget
    pub fn with_default_widgets() -> Self {
        let mut registry = Self::new();

        registry.register(ids::TEXT_INPUT, || Box::new(Input::new(ids::TEXT_INPUT, "text")));
        registry.register(ids::PASSWORD_INPUT, || {
            Box::new(Input::new(ids::PASSWORD_INPUT, "password"))
        });
        registry.register(ids::HIDDEN_INPUT, || {
            Box::new(Input::new(ids::HIDDEN_INPUT, "hidden"))
        });
        registry.register(ids::DATE_INPUT, || Box::new(Input::new(ids::DATE_INPUT, "date")));
        registry.register(ids::DATETIME_INPUT, || {
            Box::new(Input::new(ids::DATETIME_INPUT, "datetime-local"))
        });
        registry.register(ids::TIME_INPUT, || Box::new(Input::new(ids::TIME_INPUT, "time")));
        registry.register(ids::NUMBER_INPUT, || {
            Box::new(Input::new(ids::NUMBER_INPUT, "number"))
        });
        registry.register(ids::EMAIL_INPUT, || {
            Box::new(Input::new(ids::EMAIL_INPUT, "email"))
        });
        registry.register(ids::URL_INPUT, || Box::new(Input::new(ids::URL_INPUT, "url")));
        registry.register(ids::TEXTAREA, || Box::new(Textarea));
        registry.register(ids::CHECKBOX_INPUT, || Box::new(CheckboxInput));
        registry.register(ids::SELECT, || Box::new(Select::single()));
        registry.register(ids::SELECT_MULTIPLE, || Box::new(Select::multiple()));
        registry.register(ids::RADIO_SELECT, || Box::new(ChoiceList::radio()));
        registry.register(ids::CHECKBOX_SELECT_MULTIPLE, || {
            Box::new(ChoiceList::checkboxes())
        });

        registry
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    /// Construct the widget registered under `identifier`
    pub fn build(&self, identifier: &str) -> Result<Box<dyn Widget>> {
        self.factories
            .get(identifier)
            .map(|factory| factory())
            .ok_or_else(|| {
                FormError::configuration(format!("Unknown widget '{}'", identifier))
            })
    }

    pub fn identifiers(&self) -> Vec<&str> {
        let mut identifiers: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        identifiers.sort_unstable();
        identifiers
    }
}

impl Default for WidgetRegistry {
    fn default() -> Self {
        Self::with_default_widgets()
    }
}

impl fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetRegistry")
            .field("widgets", &self.identifiers())
            .finish()
    }
}

pub(crate) fn escape(raw: &str) -> String {
    handlebars::html_escape(raw)
}

pub(crate) fn required_attr(required: bool) -> &'static str {
    if required { " required" } else { "" }
}
