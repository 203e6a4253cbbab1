use std::sync::Arc;
use async_trait::async_trait;
use uuid::Uuid;
use sqlx::PgPool;

use crate::models::{AppError, ExpenseGroup, Post, PostWithAuthor, ProfileChanges, User};

mod memory;
mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions { pub page: u32, pub per_page: u32 }
impl ListOptions {
    pub fn clamp(self, max_per_page: u32) -> Self { let per = self.per_page.min(max_per_page).max(1); let page = self.page.max(1); Self { page, per_page: per } }
    pub fn offset(&self) -> usize { (self.page.saturating_sub(1) as usize).saturating_mul(self.per_page as usize) }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `DuplicateEmail` when the (case-insensitive) email is taken.
    async fn create(&self, user: User) -> Result<User, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<User, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<User, AppError>;
    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, AppError>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: Post) -> Result<Post, AppError>;
    /// Newest first, with the author's name resolved.
    async fn list(&self, opts: ListOptions) -> Result<Vec<PostWithAuthor>, AppError>;
}

#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    async fn create(&self, group: ExpenseGroup) -> Result<ExpenseGroup, AppError>;
    /// Groups owned by `owner_id`, newest first.
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<ExpenseGroup>, AppError>;
    /// Deletes the group only if `owner_id` owns it; `NotFound` otherwise.
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<(), AppError>;
}

/// One handle per collection, all backed by the same store.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub expenses: Arc<dyn ExpenseRepository>,
}

#[derive(Debug, Clone)]
pub struct RepositoryFactory;
impl RepositoryFactory {
    pub fn postgres(pool: PgPool) -> Repositories { Self::from_store(Arc::new(PostgresStore::new(pool))) }
    pub fn in_memory() -> Repositories { Self::from_store(Arc::new(InMemoryStore::new())) }

    fn from_store<S>(store: Arc<S>) -> Repositories
    where S: UserRepository + PostRepository + ExpenseRepository + 'static {
        Repositories { users: store.clone(), posts: store.clone(), expenses: store }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_bounds_page_and_size() {
        let o = ListOptions { page: 0, per_page: 0 }.clamp(100);
        assert_eq!(o, ListOptions { page: 1, per_page: 1 });
        let o = ListOptions { page: 3, per_page: 500 }.clamp(100);
        assert_eq!(o, ListOptions { page: 3, per_page: 100 });
    }

    #[test]
    fn offset_skips_earlier_pages() {
        assert_eq!(ListOptions { page: 1, per_page: 10 }.offset(), 0);
        assert_eq!(ListOptions { page: 2, per_page: 10 }.offset(), 10);
    }
}
