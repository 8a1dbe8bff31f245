pub mod analytics_handlers;
pub mod auth_handlers;
mod extract;
pub mod health;
pub mod link_handlers;
pub mod qr_handlers;
mod router;
pub mod types;

pub use extract::AppJson;
pub use router::create_router;

// Re-export AppState for convenience
pub use crate::state::AppState;
