pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handler;
pub mod registry;
pub mod server;
pub mod session;

pub use app::{build_app, Application, CounterApp, StaticPage};
pub use config::{Config, DEFAULT_CONFIG_NAME};
pub use error::{ServerError, ServerResult};
pub use registry::{is_valid_session_id, new_session_id, SessionRegistry};
pub use server::{build_router, AppState, Server};
pub use session::{Session, SessionId};
