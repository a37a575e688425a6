//! Persistence contracts: the relational store (users, messages) and the
//! vector store (per-user chunk namespaces).

pub mod relational;
pub mod vector;

pub use relational::{PgRelationalStore, RelationalStore};
pub use vector::{VectorQueryResult, VectorStore};
