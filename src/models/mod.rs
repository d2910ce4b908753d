pub mod catalog;
pub mod description;
pub mod query;

pub use catalog::*;
pub use description::*;
pub use query::*;
