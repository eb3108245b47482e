// src/models/course.rs

use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'courses' table: the programmes students register for.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
}
