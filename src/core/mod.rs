pub mod error;
pub mod types;
pub mod value;

pub use error::{FormError, Result};
pub use types::{Column, DataType, Row, Schema};
pub use value::Value;
