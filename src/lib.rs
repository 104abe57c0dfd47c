//! Kitchen staff service: dish types, dishes, cooks and who cooks what.

#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;

pub mod auth;
pub mod config;
pub mod error;
pub mod forms;
pub mod handlers;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod models;
mod query;
pub mod schema;
pub mod search;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
