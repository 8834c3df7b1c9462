pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod mail;
pub mod rbac;
pub mod settings;
pub mod store;
