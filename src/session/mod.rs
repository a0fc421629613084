//! Persistent, continuable task sessions.
//!
//! Each session is one JSON record under the storage directory. Expiry is
//! computed lazily from `updated_at` at read time; nothing sweeps in the
//! background, and records are only removed by an explicit purge or delete.

mod model;
mod store;


pub use model::{HistoryEntry, Session, SessionStatus, new_session_id};
pub use store::SessionStore;
