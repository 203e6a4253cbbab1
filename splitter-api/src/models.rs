use axum::{http::StatusCode, response::{IntoResponse, Response}};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::split;

pub const DEFAULT_CURRENCY: &str = "INR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub avatar: String,
    pub dob: String,
    pub bio: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: String, password_hash: String, currency: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email: email.to_lowercase(),
            password_hash,
            avatar: String::new(),
            dob: String::new(),
            bio: String::new(),
            currency,
            created_at: now(),
        }
    }

    pub fn validate_email(email: &str) -> Result<(), AppError> {
        let has_at = email.contains('@');
        let has_dot = email.contains('.');
        let ok_len = email.len() <= 254 && email.len() >= 3;
        if has_at && has_dot && ok_len { Ok(()) } else { Err(AppError::Validation("invalid email format".into())) }
    }

    /// Applies the fields present in `changes`; absent fields keep their value.
    pub fn apply(&mut self, changes: ProfileChanges) {
        if let Some(name) = changes.name { self.name = name; }
        if let Some(dob) = changes.dob { self.dob = dob; }
        if let Some(bio) = changes.bio { self.bio = bio; }
        if let Some(avatar) = changes.avatar { self.avatar = avatar; }
        if let Some(currency) = changes.currency { self.currency = currency; }
    }
}

/// Partial profile update. `None` leaves the stored field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub dob: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub currency: Option<String>,
}

impl ProfileChanges {
    pub fn currency(currency: String) -> Self { Self { currency: Some(currency), ..Self::default() } }
}

/// User as exposed over HTTP: everything but the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub dob: String,
    pub bio: String,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}
impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self { id: u.id, name: u.name, email: u.email, avatar: u.avatar, dob: u.dob, bio: u.bio, currency: u.currency, created_at: u.created_at }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary { pub id: Uuid, pub name: String, pub email: String }
impl From<User> for UserSummary { fn from(u: User) -> Self { Self { id: u.id, name: u.name, email: u.email } } }

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(author_id: Uuid, content: String) -> Self { Self { id: Uuid::new_v4(), author_id, content, created_at: now() } }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostAuthor { pub id: Uuid, pub name: String }

/// Feed entry with the author's name attached; `author` is `None` when the
/// referenced user no longer exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostWithAuthor {
    pub id: Uuid,
    pub author: Option<PostAuthor>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseGroup {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub members: Vec<String>,
    pub expenses: Vec<f64>,
    pub total: f64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl ExpenseGroup {
    /// Builds a group owned by `owner_id`. The total is always derived from
    /// `expenses`; the two lists must line up one amount per member.
    pub fn new(owner_id: Uuid, members: Vec<String>, expenses: Vec<f64>, currency: String) -> Result<Self, AppError> {
        if members.len() != expenses.len() {
            return Err(AppError::Validation("members and expenses must have the same length".into()));
        }
        if expenses.iter().any(|e| !e.is_finite()) {
            return Err(AppError::Validation("expenses must be finite numbers".into()));
        }
        let total = split::total(&expenses);
        if !total.is_finite() {
            return Err(AppError::Validation("expenses total is out of range".into()));
        }
        Ok(Self { id: Uuid::new_v4(), owner_id, members, expenses, total, currency, created_at: now() })
    }

    pub fn per_member_share(&self) -> f64 { split::per_member_share(self.total, self.members.len()) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseGroupResponse {
    #[serde(flatten)]
    pub group: ExpenseGroup,
    pub per_member_share: f64,
}
impl From<ExpenseGroup> for ExpenseGroupResponse {
    fn from(group: ExpenseGroup) -> Self { let per_member_share = group.per_member_share(); Self { group, per_member_share } }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")] Validation(String),
    #[error("Email already exists")] DuplicateEmail,
    #[error("Access denied: no token provided")] MissingToken,
    #[error("Invalid token")] InvalidToken,
    #[error("Token expired")] TokenExpired,
    #[error("Invalid credentials")] InvalidCredentials,
    #[error("{0}")] NotFound(String),
    #[error("jwt error: {0}")] Jwt(String),
    #[error("password error: {0}")] Bcrypt(String),
    #[error("repository error: {0}")] Repo(String),
    #[error("io error: {0}")] Io(String),
    #[error("unknown error: {0}")] Unknown(String),
}
impl AppError { pub fn status_code(&self) -> StatusCode { match self {
    AppError::Validation(_) | AppError::DuplicateEmail => StatusCode::BAD_REQUEST,
    AppError::InvalidToken | AppError::TokenExpired => StatusCode::BAD_REQUEST,
    AppError::MissingToken | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
    AppError::NotFound(_) => StatusCode::NOT_FOUND,
    AppError::Jwt(_) | AppError::Bcrypt(_) | AppError::Repo(_) | AppError::Io(_) | AppError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
}}}
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            // Storage failures echo the raw detail to the caller.
            AppError::Repo(detail) | AppError::Io(detail) => serde_json::json!({"error": "Server error", "details": detail}),
            _ => serde_json::json!({"error": self.to_string()}),
        };
        if status.is_server_error() { tracing::error!(error = %self, "request failed"); }
        (status, axum::Json(body)).into_response()
    }
}
impl From<bcrypt::BcryptError> for AppError { fn from(e: bcrypt::BcryptError) -> Self { AppError::Bcrypt(e.to_string()) } }
impl From<jsonwebtoken::errors::Error> for AppError { fn from(e: jsonwebtoken::errors::Error) -> Self { AppError::Jwt(e.to_string()) } }
impl From<sqlx::Error> for AppError { fn from(e: sqlx::Error) -> Self { AppError::Repo(e.to_string()) } }
impl From<std::io::Error> for AppError { fn from(e: std::io::Error) -> Self { AppError::Io(e.to_string()) } }
impl From<anyhow::Error> for AppError { fn from(e: anyhow::Error) -> Self { AppError::Unknown(e.to_string()) } }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest { pub name: Option<String>, pub email: Option<String>, pub password: Option<String> }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest { pub email: Option<String>, pub password: Option<String> }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyRequest { pub currency: Option<String> }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest { pub content: Option<String> }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExpenseRequest { pub members: Option<Vec<String>>, pub expenses: Option<Vec<f64>>, pub currency: Option<String> }

/// Returns the trimmed value when it is present and non-blank.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub fn now() -> DateTime<Utc> { Utc::now() }

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User { User::new("Asha".into(), "Asha@Example.com".into(), "hash".into(), DEFAULT_CURRENCY.into()) }

    #[test]
    fn new_user_lowercases_email_and_defaults_profile() {
        let u = sample_user();
        assert_eq!(u.email, "asha@example.com");
        assert_eq!(u.avatar, "");
        assert_eq!(u.currency, "INR");
    }

    #[test]
    fn apply_keeps_fields_that_are_not_supplied() {
        let mut u = sample_user();
        u.avatar = "/uploads/1-me.png".into();
        u.apply(ProfileChanges { bio: Some("hiker".into()), ..ProfileChanges::default() });
        assert_eq!(u.bio, "hiker");
        assert_eq!(u.avatar, "/uploads/1-me.png");
        assert_eq!(u.name, "Asha");
    }

    #[test]
    fn profile_view_has_no_password() {
        let v = serde_json::to_value(UserProfile::from(sample_user())).unwrap();
        assert!(v.get("passwordHash").is_none());
        assert!(v.get("password_hash").is_none());
        assert!(v.get("createdAt").is_some());
    }

    #[test]
    fn expense_group_recomputes_total() {
        let g = ExpenseGroup::new(Uuid::new_v4(), vec!["a".into(), "b".into(), "c".into()], vec![10.0, 20.0, 30.0], "USD".into()).unwrap();
        assert_eq!(g.total, 60.0);
        assert_eq!(g.per_member_share(), 20.0);
    }

    #[test]
    fn expense_group_rejects_mismatched_lengths() {
        let err = ExpenseGroup::new(Uuid::new_v4(), vec!["a".into()], vec![1.0, 2.0], "USD".into()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn expense_group_rejects_overflowing_total() {
        let err = ExpenseGroup::new(Uuid::new_v4(), vec!["a".into(), "b".into()], vec![1e308, 1e308], "USD".into()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn status_codes() {
        assert_eq!(AppError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InvalidToken.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::DuplicateEmail.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("user not found".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Repo("boom".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
