//! External collaborator traits and in-memory implementations.

pub mod custody;
pub mod dice;
pub mod publisher;

pub use custody::{CustodyService, InMemoryCustodyService, ItemDetails};
pub use dice::{DiceService, RandomDiceService, ScriptedDiceService};
pub use publisher::{EventPublisher, InMemoryEventPublisher, PublishedMessage};
