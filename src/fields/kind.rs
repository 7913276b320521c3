//! Field kinds and the data type -> kind registry.

use super::form_field::FieldClass;
use crate::core::{Column, DataType};
use crate::storage::TableSchema;
use crate::widgets::ids;
use std::fmt;

pub const FIELD_VARIANT_PREFIX: &str = "memoforms_field_";

/// One concrete field specification variant per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKind {
    Boolean,
    Char,
    Date,
    DateTime,
    Decimal,
    Duration,
    Email,
    Float,
    Integer,
    IpAddress,
    Slug,
    Time,
    Url,
    Uuid,
    Choice,
    MultipleChoice,
    ForeignKey,
    ManyToMany,
}

impl FieldKind {
    pub const ALL: [FieldKind; 18] = [
        FieldKind::Boolean,
        FieldKind::Char,
        FieldKind::Date,
        FieldKind::DateTime,
        FieldKind::Decimal,
        FieldKind::Duration,
        FieldKind::Email,
        FieldKind::Float,
        FieldKind::Integer,
        FieldKind::IpAddress,
        FieldKind::Slug,
        FieldKind::Time,
        FieldKind::Url,
        FieldKind::Uuid,
        FieldKind::Choice,
        FieldKind::MultipleChoice,
        FieldKind::ForeignKey,
        FieldKind::ManyToMany,
    ];

    /// Stored `real_type` marker.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Char => "char",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Decimal => "decimal",
            Self::Duration => "duration",
            Self::Email => "email",
            Self::Float => "float",
            Self::Integer => "integer",
            Self::IpAddress => "ip_address",
            Self::Slug => "slug",
            Self::Time => "time",
            Self::Url => "url",
            Self::Uuid => "uuid",
            Self::Choice => "choice",
            Self::MultipleChoice => "multiple_choice",
            Self::ForeignKey => "foreign_key",
            Self::ManyToMany => "many_to_many",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn verbose_name(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean Field",
            Self::Char => "Char Field",
            Self::Date => "Date Field",
            Self::DateTime => "Date Time Field",
            Self::Decimal => "Decimal Field",
            Self::Duration => "Duration Field",
            Self::Email => "Email Field",
            Self::Float => "Float Field",
            Self::Integer => "Integer Field",
            Self::IpAddress => "IP Address Field",
            Self::Slug => "Slug Field",
            Self::Time => "Time Field",
            Self::Url => "URL Field",
            Self::Uuid => "UUID Field",
            Self::Choice => "Choice Field",
            Self::MultipleChoice => "Multiple Choice Field",
            Self::ForeignKey => "Foreign Key Field",
            Self::ManyToMany => "Many To Many Field",
        }
    }

    /// Runtime field class this kind instantiates.
    pub fn field_class(self) -> FieldClass {
        match self {
            Self::Boolean => FieldClass::Boolean,
            Self::Char => FieldClass::Char,
            Self::Date => FieldClass::Date,
            Self::DateTime => FieldClass::DateTime,
            Self::Decimal => FieldClass::Decimal,
            Self::Duration => FieldClass::Duration,
            Self::Email => FieldClass::Email,
            Self::Float => FieldClass::Float,
            Self::Integer => FieldClass::Integer,
            Self::IpAddress => FieldClass::GenericIpAddress,
            Self::Slug => FieldClass::Slug,
            Self::Time => FieldClass::Time,
            Self::Url => FieldClass::Url,
            Self::Uuid => FieldClass::Uuid,
            Self::Choice => FieldClass::Choice,
            Self::MultipleChoice => FieldClass::MultipleChoice,
            Self::ForeignKey => FieldClass::ModelChoice,
            Self::ManyToMany => FieldClass::ModelMultipleChoice,
        }
    }

    /// Allowed widget identifiers; the first is the default.
    pub fn widgets(self) -> &'static [&'static str] {
        match self {
            Self::Boolean => &[ids::CHECKBOX_INPUT],
            Self::Char => &[ids::TEXT_INPUT, ids::TEXTAREA, ids::PASSWORD_INPUT],
            Self::Date => &[ids::DATE_INPUT],
            Self::DateTime => &[ids::DATETIME_INPUT],
            Self::Time => &[ids::TIME_INPUT],
            Self::Decimal | Self::Float | Self::Integer => &[ids::NUMBER_INPUT],
            Self::Email => &[ids::EMAIL_INPUT],
            Self::Url => &[ids::URL_INPUT],
            Self::Duration | Self::IpAddress | Self::Slug | Self::Uuid => &[ids::TEXT_INPUT],
            Self::Choice | Self::ForeignKey => &[ids::SELECT, ids::RADIO_SELECT],
            Self::MultipleChoice | Self::ManyToMany => {
                &[ids::SELECT_MULTIPLE, ids::CHECKBOX_SELECT_MULTIPLE]
            }
        }
    }

    pub fn default_widget(self) -> &'static str {
        self.widgets()[0]
    }

    pub fn allows_widget(self, identifier: &str) -> bool {
        self.widgets().contains(&identifier)
    }

    /// Type of the stored initial value; `None` when the kind has none.
    pub fn initial_type(self) -> Option<DataType> {
        match self {
            Self::Boolean => Some(DataType::Boolean),
            Self::Char => Some(DataType::Text),
            Self::Date => Some(DataType::Date),
            Self::DateTime => Some(DataType::DateTime),
            Self::Decimal => Some(DataType::Decimal),
            Self::Duration => Some(DataType::Duration),
            Self::Email => Some(DataType::Email),
            Self::Float => Some(DataType::Float),
            Self::Integer => Some(DataType::Integer),
            Self::IpAddress => Some(DataType::IpAddress),
            Self::Slug => Some(DataType::Slug),
            Self::Time => Some(DataType::Time),
            Self::Url => Some(DataType::Url),
            Self::Uuid => Some(DataType::Uuid),
            Self::Choice | Self::MultipleChoice | Self::ForeignKey | Self::ManyToMany => None,
        }
    }

    pub fn is_relational(self) -> bool {
        matches!(self, Self::ForeignKey | Self::ManyToMany)
    }

    pub fn has_choices(self) -> bool {
        matches!(self, Self::Choice | Self::MultipleChoice)
    }

    pub fn variant_table(self) -> String {
        format!("{}{}", FIELD_VARIANT_PREFIX, self.tag())
    }

    pub fn variant_schema(self) -> TableSchema {
        let payload = if self.has_choices() {
            Column::new("choices", DataType::Text).not_null()
        } else if self.is_relational() {
            Column::new("related_type", DataType::Text).not_null()
        } else {
            // initial_type() is Some for every remaining kind
            Column::new("initial_data", self.initial_type().unwrap_or(DataType::Text))
        };

        TableSchema::new(
            self.variant_table(),
            vec![
                Column::new("field_ptr", DataType::Integer).primary_key(),
                payload,
            ],
        )
    }

    /// Kind suggested for a model column of the given type.
    pub fn for_data_type(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::AutoId => None,
            DataType::Boolean => Some(Self::Boolean),
            DataType::Text => Some(Self::Char),
            DataType::Email => Some(Self::Email),
            DataType::Url => Some(Self::Url),
            DataType::Slug => Some(Self::Slug),
            DataType::IpAddress => Some(Self::IpAddress),
            DataType::Uuid => Some(Self::Uuid),
            DataType::Integer => Some(Self::Integer),
            DataType::Float => Some(Self::Float),
            DataType::Decimal => Some(Self::Decimal),
            DataType::Date => Some(Self::Date),
            DataType::DateTime => Some(Self::DateTime),
            DataType::Time => Some(Self::Time),
            DataType::Duration => Some(Self::Duration),
            DataType::ForeignKey(_) => Some(Self::ForeignKey),
            DataType::ManyToMany(_) => Some(Self::ManyToMany),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Field kind that should represent a model column, if any.
pub fn resolve_variant(column: &Column) -> Option<FieldKind> {
    if column.primary_key && column.data_type == DataType::AutoId {
        return None;
    }
    FieldKind::for_data_type(&column.data_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_round_trip() {
        for kind in FieldKind::ALL {
            assert_eq!(FieldKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(FieldKind::from_tag("omni_nothing"), None);
    }

    #[test]
    fn test_resolve_variant_by_column_type() {
        let cases = [
            (DataType::Text, FieldKind::Char),
            (DataType::Boolean, FieldKind::Boolean),
            (DataType::DateTime, FieldKind::DateTime),
            (DataType::Decimal, FieldKind::Decimal),
            (DataType::Email, FieldKind::Email),
            (DataType::Float, FieldKind::Float),
            (DataType::Integer, FieldKind::Integer),
            (DataType::Time, FieldKind::Time),
            (DataType::Url, FieldKind::Url),
        ];
        for (data_type, expected) in cases {
            assert_eq!(resolve_variant(&Column::new("f", data_type)), Some(expected));
        }
        assert_eq!(resolve_variant(&Column::auto_id("id")), None);
    }

    #[test]
    fn test_widget_allow_lists() {
        assert!(FieldKind::Char.allows_widget(ids::TEXT_INPUT));
        assert!(FieldKind::Char.allows_widget(ids::TEXTAREA));
        assert!(FieldKind::Char.allows_widget(ids::PASSWORD_INPUT));
        assert!(!FieldKind::Char.allows_widget(ids::CHECKBOX_INPUT));
        assert_eq!(FieldKind::Boolean.default_widget(), ids::CHECKBOX_INPUT);
        assert!(FieldKind::ManyToMany.allows_widget(ids::CHECKBOX_SELECT_MULTIPLE));
        assert!(FieldKind::ForeignKey.allows_widget(ids::RADIO_SELECT));
    }

    #[test]
    fn test_relational_kinds_have_no_initial() {
        assert_eq!(FieldKind::ForeignKey.initial_type(), None);
        assert_eq!(FieldKind::ManyToMany.initial_type(), None);
        assert_eq!(FieldKind::Decimal.initial_type(), Some(DataType::Decimal));
    }

    #[test]
    fn test_variant_schema_payload() {
        let schema = FieldKind::Float.variant_schema();
        assert_eq!(schema.name(), "memoforms_field_float");
        assert_eq!(
            schema.get_column("initial_data").map(|c| c.data_type.clone()),
            Some(DataType::Float)
        );
        assert!(FieldKind::Choice.variant_schema().get_column("choices").is_some());
        assert!(
            FieldKind::ForeignKey
                .variant_schema()
                .get_column("related_type")
                .is_some()
        );
    }
}
