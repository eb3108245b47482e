// src/models/user.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::validation::{validate_password_strength, validate_profile_image, validate_sa_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Lecturer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Lecturer => "lecturer",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "lecturer" => Ok(Role::Lecturer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub surname: String,

    /// Unique login identifier.
    pub email: String,

    /// South African ID number; absent for the seeded admin.
    pub id_number: Option<String>,

    pub gender: Option<String>,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// 'student', 'lecturer' or 'admin'.
    pub role: String,

    pub course_id: Option<i64>,
    pub profile_image: Option<String>,

    /// Whether the email address has been confirmed.
    pub is_verified: bool,

    #[serde(skip)]
    pub verification_token: Option<String>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub const USER_COLUMNS: &str = "id, name, surname, email, id_number, gender, password, role, \
     course_id, profile_image, is_verified, verification_token, created_at";

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_passwords_match))]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 50, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(length(min = 2, max = 50, message = "Surname must be at least 2 characters"))]
    pub surname: String,
    #[validate(custom(function = validate_gender))]
    pub gender: String,
    #[validate(email(message = "Please enter a valid email address"))]
    pub email: String,
    #[validate(custom(function = validate_sa_id))]
    pub id_number: String,
    #[validate(custom(function = validate_password_strength))]
    pub password: String,
    pub confirm_password: String,
    #[validate(custom(function = validate_registration_role))]
    pub role: String,
    pub course_id: i64,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResendVerificationRequest {
    #[validate(email)]
    pub email: String,
}

/// DTO for a user editing their own profile.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 50))]
    pub name: Option<String>,
    #[validate(length(min = 2, max = 50))]
    pub surname: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom(function = validate_profile_image))]
    pub profile_image: Option<String>,
}

fn validate_gender(gender: &str) -> Result<(), validator::ValidationError> {
    match gender {
        "male" | "female" | "other" => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_gender")
            .with_message("Please select a gender".into())),
    }
}

/// Admin accounts are never self-registered.
fn validate_registration_role(role: &str) -> Result<(), validator::ValidationError> {
    match role.parse::<Role>() {
        Ok(Role::Student) | Ok(Role::Lecturer) => Ok(()),
        _ => Err(validator::ValidationError::new("invalid_role")
            .with_message("Please select a role".into())),
    }
}

fn validate_passwords_match(req: &RegisterRequest) -> Result<(), validator::ValidationError> {
    if req.password == req.confirm_password {
        Ok(())
    } else {
        Err(validator::ValidationError::new("passwords_mismatch")
            .with_message("Passwords do not match".into()))
    }
}
