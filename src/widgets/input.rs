use super::{RenderAttrs, Widget, escape, required_attr};
use crate::core::Value;

/// `<input type="...">` for scalar values.
#[derive(Debug, Clone)]
pub struct Input {
    identifier: &'static str,
    input_type: &'static str,
}

impl Input {
    pub fn new(identifier: &'static str, input_type: &'static str) -> Self {
        Self {
            identifier,
            input_type,
        }
    }

    pub fn input_type(&self) -> &'static str {
        self.input_type
    }
}

impl Widget for Input {
    fn identifier(&self) -> &'static str {
        self.identifier
    }

    fn render(&self, name: &str, value: &Value, attrs: &RenderAttrs<'_>) -> String {
        // Passwords are never echoed back.
        let value_attr = if value.is_empty() || self.input_type == "password" {
            String::new()
        } else {
            let formatted = match (self.input_type, value) {
                ("datetime-local", Value::DateTime(dt)) => {
                    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
                }
                _ => value.to_string(),
            };
            format!(" value=\"{}\"", escape(&formatted))
        };

        format!(
            "<input type=\"{}\" name=\"{}\" id=\"{}\"{}{}>",
            self.input_type,
            escape(name),
            escape(&attrs.id),
            value_attr,
            required_attr(attrs.required)
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Textarea;

impl Widget for Textarea {
    fn identifier(&self) -> &'static str {
        super::ids::TEXTAREA
    }

    fn render(&self, name: &str, value: &Value, attrs: &RenderAttrs<'_>) -> String {
        format!(
            "<textarea name=\"{}\" id=\"{}\" cols=\"40\" rows=\"10\"{}>\n{}</textarea>",
            escape(name),
            escape(&attrs.id),
            required_attr(attrs.required),
            escape(&value.to_string())
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CheckboxInput;

impl Widget for CheckboxInput {
    fn identifier(&self) -> &'static str {
        super::ids::CHECKBOX_INPUT
    }

    fn render(&self, name: &str, value: &Value, attrs: &RenderAttrs<'_>) -> String {
        let checked = if value.as_bool().unwrap_or(false) {
            " checked"
        } else {
            ""
        };
        format!(
            "<input type=\"checkbox\" name=\"{}\" id=\"{}\"{}{}>",
            escape(name),
            escape(&attrs.id),
            checked,
            required_attr(attrs.required)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> RenderAttrs<'static> {
        RenderAttrs {
            id: "id_title".into(),
            required: true,
            choices: &[],
        }
    }

    #[test]
    fn test_text_input_escapes_value() {
        let html = Input::new("text_input", "text").render("title", &Value::from("<b>"), &attrs());
        assert_eq!(
            html,
            "<input type=\"text\" name=\"title\" id=\"id_title\" value=\"&lt;b&gt;\" required>"
        );
    }

    #[test]
    fn test_password_input_hides_value() {
        let html = Input::new("password_input", "password").render(
            "secret",
            &Value::from("hunter2"),
            &attrs(),
        );
        assert!(!html.contains("hunter2"));
    }

    #[test]
    fn test_checkbox_checked() {
        let html = CheckboxInput.render("agree", &Value::Boolean(true), &attrs());
        assert!(html.contains(" checked"));
        let html = CheckboxInput.render("agree", &Value::Null, &attrs());
        assert!(!html.contains(" checked"));
    }
}
