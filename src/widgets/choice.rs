use super::{RenderAttrs, Widget, escape, ids, required_attr};
use crate::core::Value;

fn selected_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::List(items) => items.iter().map(|item| item.to_string()).collect(),
        other => vec![other.to_string()],
    }
}

/// `<select>`, optionally with `multiple`.
#[derive(Debug, Clone, Copy)]
pub struct Select {
    multiple: bool,
}

impl Select {
    pub fn single() -> Self {
        Self { multiple: false }
    }

    pub fn multiple() -> Self {
        Self { multiple: true }
    }
}

impl Widget for Select {
    fn identifier(&self) -> &'static str {
        if self.multiple {
            ids::SELECT_MULTIPLE
        } else {
            ids::SELECT
        }
    }

    fn render(&self, name: &str, value: &Value, attrs: &RenderAttrs<'_>) -> String {
        let selected = selected_keys(value);
        let mut html = format!(
            "<select name=\"{}\" id=\"{}\"{}{}>",
            escape(name),
            escape(&attrs.id),
            if self.multiple { " multiple" } else { "" },
            required_attr(attrs.required)
        );
        for (key, label) in attrs.choices {
            let mark = if selected.contains(key) { " selected" } else { "" };
            html.push_str(&format!(
                "\n  <option value=\"{}\"{}>{}</option>",
                escape(key),
                mark,
                escape(label)
            ));
        }
        html.push_str("\n</select>");
        html
    }

    fn allows_multiple_values(&self) -> bool {
        self.multiple
    }
}

/// A `<ul>` of radio buttons or checkboxes.
#[derive(Debug, Clone, Copy)]
pub struct ChoiceList {
    input_type: &'static str,
}

impl ChoiceList {
    pub fn radio() -> Self {
        Self { input_type: "radio" }
    }

    pub fn checkboxes() -> Self {
        Self {
            input_type: "checkbox",
        }
    }
}

impl Widget for ChoiceList {
    fn identifier(&self) -> &'static str {
        if self.input_type == "radio" {
            ids::RADIO_SELECT
        } else {
            ids::CHECKBOX_SELECT_MULTIPLE
        }
    }

    fn render(&self, name: &str, value: &Value, attrs: &RenderAttrs<'_>) -> String {
        let selected = selected_keys(value);
        let mut html = format!("<ul id=\"{}\">", escape(&attrs.id));
        for (idx, (key, label)) in attrs.choices.iter().enumerate() {
            let mark = if selected.contains(key) { " checked" } else { "" };
            html.push_str(&format!(
                "\n  <li><label for=\"{id}_{idx}\"><input type=\"{kind}\" name=\"{name}\" value=\"{value}\" id=\"{id}_{idx}\"{mark}> {label}</label></li>",
                id = escape(&attrs.id),
                idx = idx,
                kind = self.input_type,
                name = escape(name),
                value = escape(key),
                mark = mark,
                label = escape(label)
            ));
        }
        html.push_str("\n</ul>");
        html
    }

    fn allows_multiple_values(&self) -> bool {
        self.input_type == "checkbox"
    }
}
