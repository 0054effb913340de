pub mod config;
pub mod error;
pub mod gemini;
pub mod image;
pub mod models;
pub mod provider;
pub mod routes;
pub mod session;
pub mod store;
pub mod workflow;
