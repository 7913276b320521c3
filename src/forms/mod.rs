pub mod bound;
pub mod class;
pub mod definition;
pub mod owner;

pub use bound::{BoundForm, FormData, RowChange, SubmissionState};
pub use class::{FormClass, FormClassBuilder};
pub use definition::{FormDefinition, FormKind};
pub use owner::{OwnerKind, OwnerRef};
