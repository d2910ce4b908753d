pub mod agent_service;
pub mod batch;
pub mod catalog;
pub mod database; // SQLite, PostgreSQL and MySQL adapters plus the registry
pub mod executor;
pub mod llm_service;
pub mod multi_agent;
pub mod normalizer;
pub mod router;
pub mod splitter;

pub use agent_service::*;
pub use batch::*;
pub use catalog::*;
pub use executor::*;
pub use llm_service::*;
pub use multi_agent::*;
pub use normalizer::*;
pub use router::*;
pub use splitter::*;
