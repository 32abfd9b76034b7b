#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod auth;
pub mod collections;
pub mod config;
pub mod data;
pub mod genres;
pub mod listing;
pub mod logging;
pub mod notify;
pub mod session;
pub mod storage;
pub mod tmdb;
pub mod ui;

#[cfg(test)]
mod test_support;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
