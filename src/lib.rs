// ============================================================================
// LUG Directory Library
// ============================================================================

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod state;
pub mod store;
pub mod token;

// Re-export main types for convenience
pub use app::build_router;
pub use core::{GroupFields, GroupRecord};
pub use dispatch::{DispatchRequest, Dispatcher, Outcome};
pub use error::{AppError, AppResult};
pub use store::{GroupStore, InMemoryGroupStore, SqliteGroupStore};
pub use token::TokenGenerator;
