// In-memory store for dev fallback and tests.
use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ExpenseRepository, ListOptions, PostRepository, UserRepository};
use crate::models::{AppError, ExpenseGroup, Post, PostAuthor, PostWithAuthor, ProfileChanges, User};

#[derive(Debug, Default)]
struct Collections {
    users: HashMap<Uuid, User>,
    posts: HashMap<Uuid, Post>,
    expenses: HashMap<Uuid, ExpenseGroup>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryStore { inner: Arc<RwLock<Collections>> }
impl InMemoryStore { pub fn new() -> Self { Self::default() } }

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create(&self, user: User) -> Result<User, AppError> {
        let mut db = self.inner.write().await;
        let email = user.email.to_lowercase();
        if db.users.values().any(|u| u.email == email) { return Err(AppError::DuplicateEmail); }
        db.users.insert(user.id, user.clone());
        Ok(user)
    }
    async fn find_by_id(&self, id: Uuid) -> Result<User, AppError> {
        let db = self.inner.read().await;
        db.users.get(&id).cloned().ok_or_else(|| AppError::NotFound("user not found".into()))
    }
    async fn find_by_email(&self, email: &str) -> Result<User, AppError> {
        let db = self.inner.read().await;
        let email = email.to_lowercase();
        db.users.values().find(|u| u.email == email).cloned().ok_or_else(|| AppError::NotFound("user not found".into()))
    }
    async fn update_profile(&self, id: Uuid, changes: ProfileChanges) -> Result<User, AppError> {
        let mut db = self.inner.write().await;
        let user = db.users.get_mut(&id).ok_or_else(|| AppError::NotFound("user not found".into()))?;
        user.apply(changes);
        Ok(user.clone())
    }
}

#[async_trait]
impl PostRepository for InMemoryStore {
    async fn create(&self, post: Post) -> Result<Post, AppError> {
        let mut db = self.inner.write().await;
        db.posts.insert(post.id, post.clone());
        Ok(post)
    }
    async fn list(&self, opts: ListOptions) -> Result<Vec<PostWithAuthor>, AppError> {
        let db = self.inner.read().await;
        let mut posts: Vec<&Post> = db.posts.values().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        let page = posts
            .into_iter()
            .skip(opts.offset())
            .take(opts.per_page as usize)
            .map(|p| PostWithAuthor {
                id: p.id,
                author: db.users.get(&p.author_id).map(|u| PostAuthor { id: u.id, name: u.name.clone() }),
                content: p.content.clone(),
                created_at: p.created_at,
            })
            .collect();
        Ok(page)
    }
}

#[async_trait]
impl ExpenseRepository for InMemoryStore {
    async fn create(&self, group: ExpenseGroup) -> Result<ExpenseGroup, AppError> {
        let mut db = self.inner.write().await;
        db.expenses.insert(group.id, group.clone());
        Ok(group)
    }
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<ExpenseGroup>, AppError> {
        let db = self.inner.read().await;
        let mut groups: Vec<ExpenseGroup> = db.expenses.values().filter(|g| g.owner_id == owner_id).cloned().collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(groups)
    }
    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<(), AppError> {
        let mut db = self.inner.write().await;
        let owned = db.expenses.get(&id).is_some_and(|g| g.owner_id == owner_id);
        if !owned { return Err(AppError::NotFound("expense group not found".into())); }
        db.expenses.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::models::DEFAULT_CURRENCY;

    fn user(email: &str) -> User { User::new("Ravi".into(), email.into(), "hash".into(), DEFAULT_CURRENCY.into()) }

    #[tokio::test]
    async fn duplicate_email_is_rejected_case_insensitively() {
        let store = InMemoryStore::new();
        UserRepository::create(&store, user("ravi@example.com")).await.unwrap();
        let err = UserRepository::create(&store, user("RAVI@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn non_ascii_email_matches_regardless_of_case() {
        let store = InMemoryStore::new();
        let created = UserRepository::create(&store, user("Émile@Example.com")).await.unwrap();
        assert_eq!(store.find_by_email("Émile@Example.com").await.unwrap().id, created.id);
        assert_eq!(store.find_by_email("ÉMILE@example.com").await.unwrap().id, created.id);
        let err = UserRepository::create(&store, user("émile@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn update_profile_is_partial() {
        let store = InMemoryStore::new();
        let u = UserRepository::create(&store, user("ravi@example.com")).await.unwrap();
        store.update_profile(u.id, ProfileChanges { avatar: Some("/uploads/1-a.png".into()), ..Default::default() }).await.unwrap();
        let updated = store.update_profile(u.id, ProfileChanges { name: Some("Ravi K".into()), ..Default::default() }).await.unwrap();
        assert_eq!(updated.name, "Ravi K");
        assert_eq!(updated.avatar, "/uploads/1-a.png");
        assert!(matches!(store.update_profile(Uuid::new_v4(), ProfileChanges::default()).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn posts_page_newest_first_with_author() {
        let store = InMemoryStore::new();
        let u = UserRepository::create(&store, user("ravi@example.com")).await.unwrap();
        let base = Utc::now();
        for i in 0..25 {
            let mut p = Post::new(u.id, format!("post {i}"));
            p.created_at = base + Duration::seconds(i);
            PostRepository::create(&store, p).await.unwrap();
        }
        let page = store.list(ListOptions { page: 2, per_page: 10 }).await.unwrap();
        let contents: Vec<&str> = page.iter().map(|p| p.content.as_str()).collect();
        let expected: Vec<String> = (5..15).rev().map(|i| format!("post {i}")).collect();
        assert_eq!(contents, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert_eq!(page[0].author.as_ref().map(|a| a.name.as_str()), Some("Ravi"));
    }

    #[tokio::test]
    async fn orphaned_post_has_no_author() {
        let store = InMemoryStore::new();
        PostRepository::create(&store, Post::new(Uuid::new_v4(), "hello".into())).await.unwrap();
        let page = store.list(ListOptions { page: 1, per_page: 10 }).await.unwrap();
        assert_eq!(page.len(), 1);
        assert!(page[0].author.is_none());
    }

    #[tokio::test]
    async fn expenses_are_scoped_to_owner() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let g = ExpenseGroup::new(owner, vec!["a".into()], vec![5.0], "INR".into()).unwrap();
        ExpenseRepository::create(&store, g.clone()).await.unwrap();
        assert_eq!(store.list_for_owner(owner).await.unwrap().len(), 1);
        assert!(store.list_for_owner(other).await.unwrap().is_empty());
        assert!(matches!(ExpenseRepository::delete(&store, g.id, other).await, Err(AppError::NotFound(_))));
        ExpenseRepository::delete(&store, g.id, owner).await.unwrap();
        assert!(store.list_for_owner(owner).await.unwrap().is_empty());
    }
}
