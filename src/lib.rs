//! Football News - a football news portal with a merchandise catalogue
//!
//! This library provides the core of the site: persistence, business rules,
//! template rendering and the HTTP router. The binary in `main.rs` wires it
//! together from `config.yml`.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod templates;
