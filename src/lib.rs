pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod semester;
pub mod services;
pub mod source;
pub mod state;
pub mod store;
