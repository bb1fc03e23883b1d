//! Client-held identity: the authenticated user, their credentials, and the
//! session manager that owns both. Everything else only reads the session or
//! calls its mutation operations.

mod profile;
mod session;
mod permissions;

pub use profile::{Tokens, UserProfile};
pub use session::{AuthState, Session, SessionChanged, SessionManager};
pub use permissions::{keys, AdminCapabilities};
