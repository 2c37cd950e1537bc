pub mod format;
pub mod handlers;
pub mod server;

pub use format::OutputFormat;
pub use handlers::{ApiError, AppState};
pub use server::{build_router, run_server, ServerConfig};
