//! Persistence for the school-management system's student records.
//!
//! [`Repository`] is the generic CRUD contract, [`StudentRepository`] adds the
//! student lookups on top of it. [`SqlRepository`] stores records in PostgreSQL,
//! [`MemoryRepository`] keeps them in process.

pub mod config;
pub mod domains;
pub mod error;
pub mod repositories;

pub use config::StoreConfig;
pub use domains::{Student, StudentField};
pub use error::RepositoryError;
pub use repositories::{
    memory::MemoryRepository,
    sql::{SqlEntity, SqlRepository},
    Entity, EntityId, Repository, StudentRepository,
};
