pub mod error;
pub mod paths;
pub mod io;
pub mod config;
pub mod store;
pub mod registry;
pub mod logging;

pub use error::{AppError, AppResult};
pub use registry::Registry;
pub use store::Store;
