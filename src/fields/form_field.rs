//! Live form fields: what a synthesized form is made of.

use crate::core::Value;
use crate::widgets::{RenderAttrs, Widget, escape};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

pub const REQUIRED_MESSAGE: &str = "This field is required.";

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$"
    )
    .expect("email pattern compiles");
    static ref SLUG_RE: Regex = Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern compiles");
    static ref DURATION_RE: Regex = Regex::new(
        r"^(?:(?P<days>-?\d+) (?:days?, )?)?(?:(?:(?P<hours>\d+):)?(?P<minutes>\d+):)?(?P<seconds>\d+)$"
    )
    .expect("duration pattern compiles");
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];

/// Runtime class of a form field: decides parsing and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldClass {
    Boolean,
    Char,
    Date,
    DateTime,
    Decimal,
    Duration,
    Email,
    Float,
    Integer,
    GenericIpAddress,
    Slug,
    Time,
    Url,
    Uuid,
    Choice,
    MultipleChoice,
    ModelChoice,
    ModelMultipleChoice,
}

impl FieldClass {
    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "BooleanField",
            Self::Char => "CharField",
            Self::Date => "DateField",
            Self::DateTime => "DateTimeField",
            Self::Decimal => "DecimalField",
            Self::Duration => "DurationField",
            Self::Email => "EmailField",
            Self::Float => "FloatField",
            Self::Integer => "IntegerField",
            Self::GenericIpAddress => "GenericIPAddressField",
            Self::Slug => "SlugField",
            Self::Time => "TimeField",
            Self::Url => "URLField",
            Self::Uuid => "UUIDField",
            Self::Choice => "ChoiceField",
            Self::MultipleChoice => "MultipleChoiceField",
            Self::ModelChoice => "ModelChoiceField",
            Self::ModelMultipleChoice => "ModelMultipleChoiceField",
        }
    }

    pub fn is_multi_valued(self) -> bool {
        matches!(self, Self::MultipleChoice | Self::ModelMultipleChoice)
    }

    fn parse(self, raw: &str, choices: &[(String, String)]) -> Result<Value, String> {
        match self {
            Self::Char => Ok(Value::Text(raw.to_string())),
            Self::Integer => raw
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| "Enter a whole number.".to_string()),
            Self::Float => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Value::Float(v)),
                _ => Err("Enter a number.".to_string()),
            },
            Self::Decimal => Decimal::from_str(raw)
                .map(Value::Decimal)
                .map_err(|_| "Enter a number.".to_string()),
            Self::Date => parse_date(raw)
                .map(Value::Date)
                .ok_or_else(|| "Enter a valid date.".to_string()),
            Self::DateTime => parse_datetime(raw)
                .map(Value::DateTime)
                .ok_or_else(|| "Enter a valid date/time.".to_string()),
            Self::Time => parse_time(raw)
                .map(Value::Time)
                .ok_or_else(|| "Enter a valid time.".to_string()),
            Self::Duration => parse_duration(raw)
                .map(Value::Duration)
                .ok_or_else(|| "Enter a valid duration.".to_string()),
            Self::Email => {
                if EMAIL_RE.is_match(raw) {
                    Ok(Value::Text(raw.to_string()))
                } else {
                    Err("Enter a valid email address.".to_string())
                }
            }
            Self::Url => parse_url(raw)
                .map(Value::Text)
                .ok_or_else(|| "Enter a valid URL.".to_string()),
            Self::Slug => {
                if SLUG_RE.is_match(raw) {
                    Ok(Value::Text(raw.to_string()))
                } else {
                    Err("Enter a valid 'slug' consisting of letters, numbers, underscores or hyphens."
                        .to_string())
                }
            }
            Self::GenericIpAddress => raw
                .parse::<IpAddr>()
                .map(|ip| Value::Text(ip.to_string()))
                .map_err(|_| "Enter a valid IPv4 or IPv6 address.".to_string()),
            Self::Uuid => uuid::Uuid::parse_str(raw)
                .map(Value::Uuid)
                .map_err(|_| "Enter a valid UUID.".to_string()),
            Self::Choice | Self::MultipleChoice => {
                if choices.iter().any(|(key, _)| key == raw) {
                    Ok(Value::Text(raw.to_string()))
                } else {
                    Err(invalid_choice(raw))
                }
            }
            Self::ModelChoice | Self::ModelMultipleChoice => {
                let known = choices.iter().any(|(key, _)| key == raw);
                match raw.parse::<i64>() {
                    Ok(id) if known => Ok(Value::Integer(id)),
                    _ if self == Self::ModelChoice => Err(
                        "Select a valid choice. That choice is not one of the available choices."
                            .to_string(),
                    ),
                    _ => Err(invalid_choice(raw)),
                }
            }
            Self::Boolean => Ok(Value::Boolean(parse_bool(raw))),
        }
    }
}

impl fmt::Display for FieldClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn invalid_choice(raw: &str) -> String {
    format!(
        "Select a valid choice. {} is not one of the available choices.",
        raw
    )
}

fn parse_bool(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "" | "false" | "0" | "off" | "no"
    )
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| parse_date(raw).and_then(|date| date.and_hms_opt(0, 0, 0)))
}

pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(raw, format).ok())
}

/// Accepts `[DD ][[HH:]MM:]SS`; returns whole seconds, or `None` when the
/// total does not fit in an `i64`.
pub fn parse_duration(raw: &str) -> Option<i64> {
    let captures = DURATION_RE.captures(raw)?;
    let part = |name: &str| -> Option<i64> {
        captures
            .name(name)
            .map(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(Some(0))
    };
    let days = part("days")?;
    let hours = part("hours")?;
    let minutes = part("minutes")?;
    let seconds = part("seconds")?;
    days.checked_mul(86_400)?
        .checked_add(hours.checked_mul(3_600)?)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
}

/// Normalizes a URL; a missing scheme means `http://`.
pub fn parse_url(raw: &str) -> Option<String> {
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    let parsed = url::Url::parse(&candidate).ok()?;
    match parsed.scheme() {
        "http" | "https" | "ftp" | "ftps" if parsed.host_str().is_some() => Some(candidate),
        _ => None,
    }
}

/// A live form field built from a field specification or a model column.
#[derive(Debug)]
pub struct FormField {
    pub name: String,
    pub class: FieldClass,
    pub label: String,
    pub help_text: Option<String>,
    pub required: bool,
    pub initial: Value,
    pub widget: Box<dyn Widget>,
    pub choices: Vec<(String, String)>,
}

impl FormField {
    pub fn html_id(&self) -> String {
        format!("id_{}", self.name)
    }

    /// Parses the submitted values for this field.
    pub fn clean(&self, raw: &[String]) -> Result<Value, String> {
        if self.class.is_multi_valued() {
            let values: Vec<&str> = raw
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .collect();
            if values.is_empty() {
                return if self.required {
                    Err(REQUIRED_MESSAGE.to_string())
                } else {
                    Ok(Value::List(Vec::new()))
                };
            }
            let cleaned = values
                .into_iter()
                .map(|value| self.class.parse(value, &self.choices))
                .collect::<Result<Vec<Value>, String>>()?;
            return Ok(Value::List(cleaned));
        }

        let value = raw.last().map(|v| v.trim()).unwrap_or("");

        if self.class == FieldClass::Boolean {
            let checked = parse_bool(value);
            if self.required && !checked {
                return Err(REQUIRED_MESSAGE.to_string());
            }
            return Ok(Value::Boolean(checked));
        }

        if value.is_empty() {
            return match (self.required, self.class) {
                (true, _) => Err(REQUIRED_MESSAGE.to_string()),
                (false, FieldClass::Char) => Ok(Value::Text(String::new())),
                (false, _) => Ok(Value::Null),
            };
        }

        self.class.parse(value, &self.choices)
    }

    /// `<p>` row with label, widget, help text and any errors.
    pub fn as_p(&self, value: &Value, errors: &[String]) -> String {
        let attrs = RenderAttrs {
            id: self.html_id(),
            required: self.required,
            choices: &self.choices,
        };

        let mut html = String::new();
        if !errors.is_empty() {
            html.push_str("<ul class=\"errorlist\">");
            for error in errors {
                html.push_str(&format!("<li>{}</li>", escape(error)));
            }
            html.push_str("</ul>\n");
        }
        html.push_str(&format!(
            "<p><label for=\"{}\">{}:</label> {}",
            escape(&attrs.id),
            escape(&self.label),
            self.widget.render(&self.name, value, &attrs)
        ));
        if let Some(help) = self.help_text.as_deref().filter(|h| !h.is_empty()) {
            html.push_str(&format!(" <span class=\"helptext\">{}</span>", escape(help)));
        }
        html.push_str("</p>");
        html
    }
}
