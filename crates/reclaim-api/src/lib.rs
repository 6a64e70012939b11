pub mod auth;
pub mod chat;
pub mod dispatch;
pub mod error;
pub mod items;
pub mod notifications;
pub mod state;

pub use dispatch::router;
pub use state::{AppState, AppStateInner};
