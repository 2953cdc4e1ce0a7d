//! HTTP middleware: sessions and identity resolution.

pub mod identity;
pub mod session;

pub use identity::CurrentIdentity;
pub use session::create_session_layer;
