//! Fills in everything the user left unset before anything is rendered.
//!
//! Defaulting only ever adds values: fields the user populated are never touched, which also
//! makes every function in here idempotent.

mod installation;
mod log_storage;

pub use installation::*;
pub use log_storage::*;
