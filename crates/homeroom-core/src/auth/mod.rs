//! Session management for the signed-in account.
//!
//! Sign-in itself is handled by the external auth provider. This module only
//! keeps the resulting `Session`: the access token sent to the API, the
//! account's user id (which scopes the bundle cache), and when the token
//! expires. Sessions are persisted to disk and expired ones are ignored.

pub mod session;

pub use session::{Session, SessionData};
