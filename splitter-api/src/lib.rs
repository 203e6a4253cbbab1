// Library crate exposing the application modules so integration tests and the binary share code.
pub mod auth;
pub mod config;
pub mod handlers;
pub mod models;
pub mod places;
pub mod repository;
pub mod split;
pub mod uploads;
