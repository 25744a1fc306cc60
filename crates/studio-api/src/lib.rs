pub mod auth;
pub mod cache;
pub mod error;
pub mod feed;
pub mod middleware;
pub mod navigation;
pub mod routes;
pub mod upload;
pub mod votes;

pub use auth::{AppState, AppStateInner, AuthSettings};
pub use routes::router;
