pub mod sqlite;

pub use sqlite::{store_path, SqliteStorage};
