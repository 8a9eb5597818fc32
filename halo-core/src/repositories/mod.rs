//! Repository traits for the data access layer
//!
//! Services talk to storage only through these traits, so the process-local
//! store shipped here can later be swapped for a shared cache without touching
//! the limiter logic.

pub mod login_attempt;
pub mod memory;

pub use login_attempt::{LoginAttemptRepository, RecordFilter, RecordUpdate};
pub use memory::InMemoryLoginAttemptRepository;
