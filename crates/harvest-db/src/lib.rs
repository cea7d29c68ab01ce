//! Harvest Database Layer
//!
//! This crate provides the persistence contract used by the engine and two
//! implementations: PostgreSQL (through `sqlx`) and an in-memory store.

pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::{InMemoryMediaStore, InMemoryProblemStore};
pub use postgres::{connect, PgMediaStore, PgProblemStore};
pub use store::{MediaStore, ProblemStore};
