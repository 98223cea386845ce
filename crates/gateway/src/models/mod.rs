//! Row models for locally-owned tables.

pub mod event;
pub mod note;

pub use event::Event;
pub use note::Note;
