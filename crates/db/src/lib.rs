pub mod connection;
pub mod entities;
pub mod keys;
pub mod migrations;
pub mod repositories;
pub mod store;
pub mod table;

pub use connection::{connect, connect_with_settings, DbPool};
pub use keys::{IndexKey, IndexName, IndexQuery, ItemKey, SortCondition, SortOrder};
pub use repositories::{Repositories, RepositoryError};
pub use store::{InMemoryTableStore, SqlTableStore, StoredItem, TableStore, WriteRequest};
pub use table::{BatchItemResult, Entity, SingleTable};
