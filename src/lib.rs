//! Messaging core of the portfolio site: visitor/administrator chat over a
//! shared message store with live queries.

pub mod chat;
pub mod common;
pub mod config;
pub mod error;
pub mod storage;
pub mod ui;

pub use error::{ChatError, StoreError};
