//! Domain models for synced mail

mod message;

pub use message::{EmailAddress, Flag, Message, MessageId};
