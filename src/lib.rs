// src/lib.rs

pub mod config;
pub mod db;
pub mod error;
pub mod exam;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;
pub mod utils;
pub mod verification;

pub use routes::create_router;
