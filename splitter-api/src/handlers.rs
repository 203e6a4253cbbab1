use std::sync::Arc;
use axum::{
    debug_handler,
    extract::{multipart::{MultipartError, MultipartRejection}, rejection::{JsonRejection, QueryRejection}, DefaultBodyLimit, Extension, Multipart, Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};
use uuid::Uuid;

use crate::{
    auth::{require_auth, AuthService, AuthUser},
    models::{non_blank, AppError, CreateExpenseRequest, CreatePostRequest, CurrencyRequest, ExpenseGroup, ExpenseGroupResponse, LoginRequest, Post, ProfileChanges, RegisterRequest, User, UserProfile, UserSummary},
    places::PlaceCatalog,
    repository::{ListOptions, Repositories},
    uploads::{AvatarStore, PUBLIC_PREFIX},
};

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub auth: Arc<dyn AuthService>,
    pub avatars: AvatarStore,
    pub places: Arc<PlaceCatalog>,
    pub default_currency: String,
    pub max_page_size: u32,
    pub max_upload_bytes: usize,
    pub db: Option<sqlx::PgPool>,
}

pub fn app(state: AppState) -> Router {
    let guard = middleware::from_fn_with_state(state.auth.clone(), require_auth);

    let protected = Router::new()
        .route("/users/profile", get(get_profile).put(update_profile))
        .route("/users/currency", put(update_currency))
        .route("/expenses", get(list_expenses).post(create_expense))
        .route("/expenses/:id", delete(delete_expense))
        .route_layer(guard.clone());

    // The feed is public to read but needs a token to write.
    let public = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/posts", get(list_posts).merge(post(create_post).route_layer(guard)))
        .route("/places", get(list_places));

    let uploads = ServeDir::new(state.avatars.dir().to_path_buf());
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .nest("/api", public.merge(protected))
        .route("/healthz", get(health))
        .nest_service(PUBLIC_PREFIX, uploads)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(v)| v).map_err(|e| AppError::Validation(e.body_text()))
}

fn multipart_error(e: MultipartError) -> AppError { AppError::Validation(e.body_text()) }

#[debug_handler]
pub async fn register(State(state): State<AppState>, payload: Result<Json<RegisterRequest>, JsonRejection>) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let (Some(name), Some(email), Some(password)) = (non_blank(payload.name), non_blank(payload.email), payload.password.filter(|p| !p.is_empty())) else {
        return Err(AppError::Validation("All fields are required".into()));
    };
    User::validate_email(&email)?;
    let password_hash = state.auth.hash_password(password).await?;
    let user = state.repos.users.create(User::new(name, email, password_hash, state.default_currency.clone())).await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(json!({ "message": "User registered successfully", "user": UserSummary::from(user) }))))
}

#[debug_handler]
pub async fn login(State(state): State<AppState>, payload: Result<Json<LoginRequest>, JsonRejection>) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let (Some(email), Some(password)) = (non_blank(payload.email), payload.password.filter(|p| !p.is_empty())) else {
        return Err(AppError::Validation("Email and password are required".into()));
    };
    let user = state.repos.users.find_by_email(&email).await.map_err(|e| match e {
        AppError::NotFound(_) => AppError::NotFound("User not found".into()),
        other => other,
    })?;
    let ok = state.auth.verify_password(password, user.password_hash.clone()).await?;
    if !ok { return Err(AppError::InvalidCredentials); }
    let token = state.auth.generate_token(user.id).await?;
    Ok(Json(json!({ "token": token })))
}

pub async fn get_profile(State(state): State<AppState>, Extension(caller): Extension<AuthUser>) -> Result<impl IntoResponse, AppError> {
    let user = state.repos.users.find_by_id(caller.id).await?;
    Ok(Json(UserProfile::from(user)))
}

/// Multipart profile edit: optional `name`, `dob`, `bio` text parts and an
/// optional `avatar` file. Parts that are absent leave the stored value alone.
pub async fn update_profile(State(state): State<AppState>, Extension(caller): Extension<AuthUser>, multipart: Result<Multipart, MultipartRejection>) -> Result<impl IntoResponse, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::Validation(e.body_text()))?;
    let mut changes = ProfileChanges::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let part = field.name().unwrap_or_default().to_string();
        match part.as_str() {
            "name" => changes.name = Some(field.text().await.map_err(multipart_error)?),
            "dob" => changes.dob = Some(field.text().await.map_err(multipart_error)?),
            "bio" => changes.bio = Some(field.text().await.map_err(multipart_error)?),
            "avatar" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if !bytes.is_empty() {
                    changes.avatar = Some(state.avatars.save(&file_name, &bytes).await?);
                }
            }
            _ => {}
        }
    }
    let user = state.repos.users.update_profile(caller.id, changes).await?;
    Ok(Json(UserProfile::from(user)))
}

pub async fn update_currency(State(state): State<AppState>, Extension(caller): Extension<AuthUser>, payload: Result<Json<CurrencyRequest>, JsonRejection>) -> Result<impl IntoResponse, AppError> {
    let currency = non_blank(json_body(payload)?.currency).ok_or_else(|| AppError::Validation("Currency is required".into()))?;
    let user = state.repos.users.update_profile(caller.id, ProfileChanges::currency(currency)).await?;
    Ok(Json(json!({ "message": "Currency updated successfully", "currency": user.currency })))
}

pub async fn create_post(State(state): State<AppState>, Extension(caller): Extension<AuthUser>, payload: Result<Json<CreatePostRequest>, JsonRejection>) -> Result<impl IntoResponse, AppError> {
    let content = non_blank(json_body(payload)?.content).ok_or_else(|| AppError::Validation("Content is required".into()))?;
    let post = state.repos.posts.create(Post::new(caller.id, content)).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Debug, Deserialize)]
pub struct PostsQuery { page: Option<u32>, limit: Option<u32> }

pub async fn list_posts(State(state): State<AppState>, query: Result<Query<PostsQuery>, QueryRejection>) -> Result<impl IntoResponse, AppError> {
    let Query(q) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    let opts = ListOptions { page: q.page.unwrap_or(1), per_page: q.limit.unwrap_or(10) }.clamp(state.max_page_size);
    let posts = state.repos.posts.list(opts).await?;
    Ok(Json(posts))
}

pub async fn create_expense(State(state): State<AppState>, Extension(caller): Extension<AuthUser>, payload: Result<Json<CreateExpenseRequest>, JsonRejection>) -> Result<impl IntoResponse, AppError> {
    let payload = json_body(payload)?;
    let (Some(members), Some(expenses)) = (payload.members, payload.expenses) else {
        return Err(AppError::Validation("Invalid members or expenses format".into()));
    };
    let currency = match non_blank(payload.currency) {
        Some(c) => c,
        None => state.repos.users.find_by_id(caller.id).await?.currency,
    };
    let group = ExpenseGroup::new(caller.id, members, expenses, currency)?;
    let group = state.repos.expenses.create(group).await?;
    Ok((StatusCode::CREATED, Json(ExpenseGroupResponse::from(group))))
}

pub async fn list_expenses(State(state): State<AppState>, Extension(caller): Extension<AuthUser>) -> Result<impl IntoResponse, AppError> {
    let groups = state.repos.expenses.list_for_owner(caller.id).await?;
    Ok(Json(groups.into_iter().map(ExpenseGroupResponse::from).collect::<Vec<_>>()))
}

pub async fn delete_expense(State(state): State<AppState>, Extension(caller): Extension<AuthUser>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let id = Uuid::parse_str(&id).map_err(|_| AppError::Validation("invalid expense id".into()))?;
    state.repos.expenses.delete(id, caller.id).await?;
    Ok(Json(json!({ "message": "Expense group deleted" })))
}

pub async fn list_places(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.places.places().to_vec())
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let Some(ref pool) = state.db else {
        return (StatusCode::OK, Json(json!({ "status": "ok", "store": "memory" })));
    };
    if sqlx::query("SELECT 1").fetch_one(pool).await.is_ok() {
        (StatusCode::OK, Json(json!({ "status": "ok", "store": "postgres" })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "degraded", "store": "postgres" })))
    }
}
