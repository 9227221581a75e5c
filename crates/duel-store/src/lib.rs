pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryDuelStore, InMemoryDuelTx};
pub use postgres::{PostgresDuelStore, PostgresDuelTx};
pub use store::{DuelStore, DuelTx};
