//! Command protocol shared by the interpreter and the relay

pub mod command;
pub mod registry;

pub use command::{Command, Narrative, NarrativeType};
