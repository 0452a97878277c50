mod app;
mod application;
mod domain;
mod infrastructure;
mod interfaces;
mod shared;

pub use app::{clear_pat, run, store_pat};
pub use domain::error::{AppError, Result};
pub use infrastructure::config::DEFAULT_CONFIG_FILE;
