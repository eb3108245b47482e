// src/models/mod.rs

pub mod course;
pub mod module;
pub mod question;
pub mod result;
pub mod user;
