pub mod cli;
pub mod client;
pub mod error;
pub mod loaders;
pub mod models;
pub mod server;
pub mod services;
pub mod utils;

pub use cli::{Cli, Commands};
pub use error::{ErrorKind, IngestError, QueryError};
pub use models::{Config, OutputFormat};
pub use services::RagService;
