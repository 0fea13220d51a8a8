pub mod api;
pub mod config;
pub mod error;
pub mod model;
pub mod model_store;
