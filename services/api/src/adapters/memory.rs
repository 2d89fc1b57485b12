//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. It backs the
//! test suite and lets the server run without Postgres during development.

use async_trait::async_trait;
use chat_studio_core::domain::{
    AuthSession, Blog, BlogDraft, Chat, Feedback, Message, Product, ProductDraft, Role, User,
    UserCredentials,
};
use chat_studio_core::ports::{DatabaseService, PortError, PortResult};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: Vec<UserCredentials>,
    auth_sessions: HashMap<String, AuthSession>,
    chats: Vec<Chat>,
    messages: Vec<Message>,
    blogs: Vec<Blog>,
    products: Vec<Product>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    /// A strictly increasing clock, so creation order and timestamp order agree.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(next);
        next
    }

    fn prune_expired_sessions(&mut self) {
        let now = Utc::now();
        self.auth_sessions.retain(|_, session| session.expires_at > now);
    }
}

/// A `DatabaseService` kept entirely in memory.
#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

fn chat_not_found(chat_id: Uuid) -> PortError {
    PortError::NotFound(format!("Chat {} not found", chat_id))
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.email == email) {
            return Err(PortError::InvalidInput(format!(
                "Email {} is already registered",
                email
            )));
        }
        let credentials = UserCredentials {
            user_id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        };
        let user = User {
            user_id: credentials.user_id.clone(),
            email: Some(credentials.email.clone()),
        };
        tables.users.push(credentials);
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let tables = self.tables.lock().await;
        tables
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        tables.prune_expired_sessions();
        let created_at = tables.tick();
        tables.auth_sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id: user_id.to_string(),
                expires_at,
                created_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<String> {
        let mut tables = self.tables.lock().await;
        tables.prune_expired_sessions();
        tables
            .auth_sessions
            .get(session_id)
            .map(|session| session.user_id.clone())
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables.lock().await.auth_sessions.remove(session_id);
        Ok(())
    }

    async fn list_auth_sessions(&self, user_id: &str) -> PortResult<Vec<AuthSession>> {
        let mut tables = self.tables.lock().await;
        tables.prune_expired_sessions();
        let mut sessions: Vec<AuthSession> = tables
            .auth_sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn delete_user_auth_session(&self, user_id: &str, session_id: &str) -> PortResult<bool> {
        let mut tables = self.tables.lock().await;
        let owned = tables
            .auth_sessions
            .get(session_id)
            .is_some_and(|s| s.user_id == user_id);
        if owned {
            tables.auth_sessions.remove(session_id);
        }
        Ok(owned)
    }

    async fn delete_auth_sessions_for_user(&self, user_id: &str) -> PortResult<()> {
        self.tables
            .lock()
            .await
            .auth_sessions
            .retain(|_, s| s.user_id != user_id);
        Ok(())
    }

    async fn create_chat(&self, owner_id: &str, title: &str) -> PortResult<Chat> {
        let mut tables = self.tables.lock().await;
        let now = tables.tick();
        let chat = Chat {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            favorite: false,
            created_at: now,
            updated_at: now,
        };
        tables.chats.push(chat.clone());
        Ok(chat)
    }

    async fn get_chat(&self, chat_id: Uuid) -> PortResult<Chat> {
        let tables = self.tables.lock().await;
        tables
            .chats
            .iter()
            .find(|c| c.id == chat_id)
            .cloned()
            .ok_or_else(|| chat_not_found(chat_id))
    }

    async fn list_chats(&self, owner_id: &str) -> PortResult<Vec<Chat>> {
        let tables = self.tables.lock().await;
        let mut chats: Vec<Chat> = tables
            .chats
            .iter()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    async fn set_favorite(&self, chat_id: Uuid, favorite: bool) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let chat = tables
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| chat_not_found(chat_id))?;
        chat.favorite = favorite;
        Ok(())
    }

    async fn delete_chat(&self, chat_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let before = tables.chats.len();
        tables.chats.retain(|c| c.id != chat_id);
        if tables.chats.len() == before {
            return Err(chat_not_found(chat_id));
        }
        tables.messages.retain(|m| m.chat_id != chat_id);
        Ok(())
    }

    async fn append_message(&self, chat_id: Uuid, role: Role, content: &str) -> PortResult<Message> {
        let mut tables = self.tables.lock().await;
        let now = tables.tick();
        let chat = tables
            .chats
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| chat_not_found(chat_id))?;
        chat.updated_at = now;

        let message = Message {
            id: Uuid::new_v4(),
            chat_id,
            role,
            content: content.to_string(),
            feedback: None,
            user_comment: None,
            created_at: now,
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, chat_id: Uuid) -> PortResult<Vec<Message>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect())
    }

    async fn set_feedback(
        &self,
        message_id: Uuid,
        feedback: Option<Feedback>,
        user_comment: Option<&str>,
    ) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let message = tables
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| PortError::NotFound(format!("Message {} not found", message_id)))?;
        message.feedback = feedback;
        message.user_comment = user_comment.map(str::to_string);
        Ok(())
    }

    async fn list_messages_for_owner(&self, owner_id: &str) -> PortResult<Vec<Message>> {
        let tables = self.tables.lock().await;
        let owned = tables.chats.iter().filter(|c| c.owner_id == owner_id);
        Ok(owned
            .flat_map(|chat| tables.messages.iter().filter(move |m| m.chat_id == chat.id))
            .cloned()
            .collect())
    }

    async fn create_blog(&self, owner_id: &str, draft: &BlogDraft, slug: &str) -> PortResult<Blog> {
        let mut tables = self.tables.lock().await;
        if tables.blogs.iter().any(|b| b.slug == slug) {
            return Err(PortError::Unexpected(format!("Slug {} already exists", slug)));
        }
        let now = tables.tick();
        let blog = Blog {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            title: draft.title.clone(),
            content: draft.content.clone(),
            slug: slug.to_string(),
            created_at: now,
            updated_at: now,
        };
        tables.blogs.push(blog.clone());
        Ok(blog)
    }

    async fn list_blogs(&self) -> PortResult<Vec<Blog>> {
        let tables = self.tables.lock().await;
        Ok(tables.blogs.iter().rev().cloned().collect())
    }

    async fn find_blog(&self, id_or_slug: &str) -> PortResult<Blog> {
        let tables = self.tables.lock().await;
        let id = Uuid::parse_str(id_or_slug).ok();
        tables
            .blogs
            .iter()
            .find(|b| Some(b.id) == id || b.slug == id_or_slug)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Blog {} not found", id_or_slug)))
    }

    async fn update_blog(&self, blog_id: Uuid, draft: &BlogDraft) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let now = tables.tick();
        let blog = tables
            .blogs
            .iter_mut()
            .find(|b| b.id == blog_id)
            .ok_or_else(|| PortError::NotFound(format!("Blog {} not found", blog_id)))?;
        blog.title = draft.title.clone();
        blog.content = draft.content.clone();
        blog.updated_at = now;
        Ok(())
    }

    async fn delete_blog(&self, blog_id: Uuid) -> PortResult<()> {
        self.tables.lock().await.blogs.retain(|b| b.id != blog_id);
        Ok(())
    }

    async fn create_product(&self, owner_id: &str, draft: &ProductDraft) -> PortResult<Product> {
        let mut tables = self.tables.lock().await;
        let now = tables.tick();
        let product = Product {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            name: draft.name.clone(),
            description: draft.description.clone(),
            price: draft.price.clone(),
            stock: draft.stock.clone(),
            image: draft.image.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.products.push(product.clone());
        Ok(product)
    }

    async fn list_products(&self) -> PortResult<Vec<Product>> {
        let tables = self.tables.lock().await;
        Ok(tables.products.iter().rev().cloned().collect())
    }

    async fn update_product(&self, product_id: Uuid, draft: &ProductDraft) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let now = tables.tick();
        let product = tables
            .products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))?;
        product.name = draft.name.clone();
        product.description = draft.description.clone();
        product.price = draft.price.clone();
        product.stock = draft.stock.clone();
        product.image = draft.image.clone();
        product.updated_at = now;
        Ok(())
    }

    async fn delete_product(&self, product_id: Uuid) -> PortResult<()> {
        self.tables.lock().await.products.retain(|p| p.id != product_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_keep_insertion_order_and_bump_chat() {
        let db = InMemoryDb::new();
        let older = db.create_chat("u1", "Older").await.unwrap();
        let newer = db.create_chat("u1", "Newer").await.unwrap();

        db.append_message(older.id, Role::User, "first").await.unwrap();
        db.append_message(older.id, Role::Assistant, "second").await.unwrap();

        let contents: Vec<String> = db
            .list_messages(older.id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, ["first", "second"]);

        let chats = db.list_chats("u1").await.unwrap();
        assert_eq!(chats[0].id, older.id);
        assert_eq!(chats[1].id, newer.id);
    }

    #[tokio::test]
    async fn unknown_chat_lists_empty_and_rejects_appends() {
        let db = InMemoryDb::new();
        let missing = Uuid::new_v4();
        assert!(db.list_messages(missing).await.unwrap().is_empty());
        assert!(matches!(
            db.append_message(missing, Role::User, "hi").await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn feedback_is_last_write_wins() {
        let db = InMemoryDb::new();
        let chat = db.create_chat("u1", "t").await.unwrap();
        let answer = db.append_message(chat.id, Role::Assistant, "A").await.unwrap();

        db.set_feedback(answer.id, Some(Feedback::Like), Some("nice"))
            .await
            .unwrap();
        db.set_feedback(answer.id, Some(Feedback::Dislike), None)
            .await
            .unwrap();

        let stored = &db.list_messages(chat.id).await.unwrap()[0];
        assert_eq!(stored.feedback, Some(Feedback::Dislike));
        assert_eq!(stored.user_comment, None);
    }

    #[tokio::test]
    async fn deleting_a_chat_removes_its_messages() {
        let db = InMemoryDb::new();
        let chat = db.create_chat("u1", "t").await.unwrap();
        db.append_message(chat.id, Role::User, "Q").await.unwrap();

        db.delete_chat(chat.id).await.unwrap();

        assert!(db.list_messages(chat.id).await.unwrap().is_empty());
        assert!(db.list_messages_for_owner("u1").await.unwrap().is_empty());
        assert!(matches!(db.get_chat(chat.id).await, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn expired_sessions_are_dropped() {
        let db = InMemoryDb::new();
        let past = Utc::now() - Duration::minutes(1);
        let future = Utc::now() + Duration::days(1);
        db.create_auth_session("old", "u1", past).await.unwrap();
        assert!(db.tables.lock().await.auth_sessions.contains_key("old"));

        assert!(matches!(
            db.validate_auth_session("old").await,
            Err(PortError::Unauthorized)
        ));
        assert!(!db.tables.lock().await.auth_sessions.contains_key("old"));

        db.create_auth_session("live", "u1", future).await.unwrap();
        db.create_auth_session("stale", "u1", past).await.unwrap();
        db.create_auth_session("other", "u2", future).await.unwrap();
        let ids: Vec<String> = db
            .list_auth_sessions("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, ["live"]);
        assert_eq!(db.tables.lock().await.auth_sessions.len(), 2);
    }

    #[tokio::test]
    async fn sessions_are_revoked_only_by_their_owner() {
        let db = InMemoryDb::new();
        let future = Utc::now() + Duration::days(1);
        db.create_auth_session("a", "u1", future).await.unwrap();
        db.create_auth_session("b", "u1", future).await.unwrap();
        db.create_auth_session("c", "u2", future).await.unwrap();

        let ids: Vec<String> = db
            .list_auth_sessions("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, ["b", "a"]);

        assert!(!db.delete_user_auth_session("u1", "c").await.unwrap());
        assert!(db.validate_auth_session("c").await.is_ok());
        assert!(db.delete_user_auth_session("u1", "a").await.unwrap());

        db.delete_auth_sessions_for_user("u1").await.unwrap();
        assert!(db.list_auth_sessions("u1").await.unwrap().is_empty());
        assert_eq!(db.list_auth_sessions("u2").await.unwrap().len(), 1);
    }
}
