//! Lost & found board API
//!
//! Profile and post record managers over three independent backends: the
//! identity provider, the blob store and the document store. The HTTP
//! surface in [`routes`] is a thin layer over the managers.

pub mod config;
pub mod error;
pub mod extract;
pub mod managers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod validation;

pub use config::AppConfig;
pub use routes::create_router;
pub use state::AppState;
