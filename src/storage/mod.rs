pub mod memory;
pub mod persistence;
pub mod table;

pub use memory::{InMemoryStorage, StorageStats};
pub use persistence::StorageSnapshot;
pub use table::{Table, TableSchema};
