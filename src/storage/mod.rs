pub mod database;
pub mod message_store;
pub mod models;
pub mod watch;

pub use message_store::{Collection, MessageStore};
pub use watch::{Subscription, recv_or_pending, watch};

use std::fs;
use std::path::Path;

/// Ensure the directory holding the database file exists
pub fn ensure_data_dir(database_path: &str) -> std::io::Result<()> {
    if let Some(parent) = Path::new(database_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
