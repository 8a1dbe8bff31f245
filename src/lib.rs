//! snaplink: URL shortener and QR code service with click analytics.

pub mod admin;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;
pub mod store;
