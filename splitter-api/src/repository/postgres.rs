use async_trait::async_trait;
use uuid::Uuid;
use sqlx::{postgres::PgRow, PgPool, Row};

use super::{ExpenseRepository, ListOptions, PostRepository, UserRepository};
use crate::models::{AppError, ExpenseGroup, Post, PostAuthor, PostWithAuthor, ProfileChanges, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, avatar, dob, bio, currency, created_at";
const EXPENSE_COLUMNS: &str = "id, owner_id, members, expenses, total, currency, created_at";

#[derive(Clone)]
pub struct PostgresStore { pub pool: PgPool }
impl PostgresStore { pub fn new(pool: PgPool) -> Self { Self { pool } } }

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        avatar: row.get("avatar"),
        dob: row.get("dob"),
        bio: row.get("bio"),
        currency: row.get("currency"),
        created_at: row.get("created_at"),
    }
}

fn expense_from_row(row: &PgRow) -> ExpenseGroup {
    ExpenseGroup {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        members: row.get("members"),
        expenses: row.get("expenses"),
        total: row.get("total"),
        currency: row.get("currency"),
        created_at: row.get("created_at"),
    }
}

fn not_found_or_repo(e: sqlx::Error, what: &str) -> AppError {
    match e {
        sqlx::Error::RowNotFound => AppError::NotFound(format!("{what} not found")),
        other => AppError::Repo(other.to_string()),
    }
}

#[async_trait]
impl UserRepository for PostgresStore {
    async fn create(&self, user: User) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.avatar)
            .bind(&user.dob)
            .bind(&user.bio)
            .bind(&user.currency)
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| if let sqlx::Error::Database(db) = &e { if db.is_unique_violation() { AppError::DuplicateEmail } else { AppError::Repo(e.to_string()) } } else { AppError::Repo(e.to_string()) })?;
        Ok(user_from_row(&row))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_repo(e, "user"))?;
        Ok(user_from_row(&row))
    }

    async fn find_by_email(&self, email: &str) -> Result<User, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = lower($1)");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_repo(e, "user"))?;
        Ok(user_from_row(&row))
    }

    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, AppError> {
        // NULL parameters keep the stored value.
        let sql = format!(
            r#"UPDATE users SET
                 name = COALESCE($2, name),
                 dob = COALESCE($3, dob),
                 bio = COALESCE($4, bio),
                 avatar = COALESCE($5, avatar),
                 currency = COALESCE($6, currency)
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(changes.name)
            .bind(changes.dob)
            .bind(changes.bio)
            .bind(changes.avatar)
            .bind(changes.currency)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_repo(e, "user"))?;
        Ok(user_from_row(&row))
    }
}

#[async_trait]
impl PostRepository for PostgresStore {
    async fn create(&self, post: Post) -> Result<Post, AppError> {
        let row = sqlx::query(
            r#"INSERT INTO posts (id, author_id, content, created_at)
               VALUES ($1, $2, $3, $4)
               RETURNING id, author_id, content, created_at"#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(&post.content)
        .bind(post.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(Post { id: row.get("id"), author_id: row.get("author_id"), content: row.get("content"), created_at: row.get("created_at") })
    }

    async fn list(&self, opts: ListOptions) -> Result<Vec<PostWithAuthor>, AppError> {
        let rows = sqlx::query(
            r#"SELECT p.id, p.content, p.created_at, u.id AS author_id, u.name AS author_name
               FROM posts p LEFT JOIN users u ON u.id = p.author_id
               ORDER BY p.created_at DESC, p.id DESC
               LIMIT $1 OFFSET $2"#,
        )
        .bind(opts.per_page as i64)
        .bind(opts.offset() as i64)
        .fetch_all(&self.pool)
        .await?;
        let posts = rows
            .into_iter()
            .map(|row| {
                let author_id: Option<Uuid> = row.get("author_id");
                let author_name: Option<String> = row.get("author_name");
                PostWithAuthor {
                    id: row.get("id"),
                    author: author_id.zip(author_name).map(|(id, name)| PostAuthor { id, name }),
                    content: row.get("content"),
                    created_at: row.get("created_at"),
                }
            })
            .collect();
        Ok(posts)
    }
}

#[async_trait]
impl ExpenseRepository for PostgresStore {
    async fn create(&self, group: ExpenseGroup) -> Result<ExpenseGroup, AppError> {
        let sql = format!(
            "INSERT INTO expense_groups ({EXPENSE_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {EXPENSE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(group.id)
            .bind(group.owner_id)
            .bind(&group.members)
            .bind(&group.expenses)
            .bind(group.total)
            .bind(&group.currency)
            .bind(group.created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(expense_from_row(&row))
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<ExpenseGroup>, AppError> {
        let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expense_groups WHERE owner_id = $1 ORDER BY created_at DESC");
        let rows = sqlx::query(&sql).bind(owner_id).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(expense_from_row).collect())
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<(), AppError> {
        let rows = sqlx::query("DELETE FROM expense_groups WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        if rows.rows_affected() == 0 { return Err(AppError::NotFound("expense group not found".into())); }
        Ok(())
    }
}
