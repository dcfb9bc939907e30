//! Request-scoped access to the caller's session.

pub mod current_session;

pub use current_session::{CurrentSession, SESSION_HEADER};
