//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chat_studio_core::domain::{
    AuthSession, Blog, BlogDraft, Chat, Feedback, Message, Product, ProductDraft, Role, User,
    UserCredentials,
};
use chat_studio_core::ports::{DatabaseService, PortError, PortResult};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found(what: impl std::fmt::Display) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what.to_string()),
        other => unexpected(other),
    }
}

const CHAT_COLUMNS: &str = "id, owner_id, title, favorite, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, chat_id, role, content, feedback, user_comment, created_at";
const BLOG_COLUMNS: &str = "id, owner_id, title, content, slug, created_at, updated_at";
const PRODUCT_COLUMNS: &str =
    "id, owner_id, name, description, price, stock, image, created_at, updated_at";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: String,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: String,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct ChatRecord {
    id: Uuid,
    owner_id: String,
    title: String,
    favorite: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ChatRecord {
    fn to_domain(self) -> Chat {
        Chat {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            favorite: self.favorite,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    chat_id: Uuid,
    role: String,
    content: String,
    feedback: Option<String>,
    user_comment: Option<String>,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> PortResult<Message> {
        Ok(Message {
            id: self.id,
            chat_id: self.chat_id,
            role: self.role.parse::<Role>()?,
            content: self.content,
            feedback: self.feedback.as_deref().map(str::parse::<Feedback>).transpose()?,
            user_comment: self.user_comment,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct BlogRecord {
    id: Uuid,
    owner_id: String,
    title: String,
    content: String,
    slug: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl BlogRecord {
    fn to_domain(self) -> Blog {
        Blog {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            content: self.content,
            slug: self.slug,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ProductRecord {
    id: Uuid,
    owner_id: String,
    name: String,
    description: String,
    price: String,
    stock: String,
    image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProductRecord {
    fn to_domain(self) -> Product {
        Product {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            description: self.description,
            price: self.price,
            stock: self.stock,
            image: self.image,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    id: String,
    user_id: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}
impl AuthSessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            id: self.id,
            user_id: self.user_id,
            expires_at: self.expires_at,
            created_at: self.created_at,
        }
    }
}

fn messages_to_domain(records: Vec<MessageRecord>) -> PortResult<Vec<Message>> {
    records.into_iter().map(MessageRecord::to_domain).collect()
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, email, hashed_password) VALUES ($1, $2, $3) RETURNING id, email",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation());
            if duplicate {
                PortError::InvalidInput(format!("Email {} is already registered", email))
            } else {
                unexpected(e)
            }
        })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<String> {
        let user_id: Option<String> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_auth_sessions(&self, user_id: &str) -> PortResult<Vec<AuthSession>> {
        let records = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT id, user_id, expires_at, created_at FROM auth_sessions \
             WHERE user_id = $1 AND expires_at > now() ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(AuthSessionRecord::to_domain).collect())
    }

    async fn delete_user_auth_session(&self, user_id: &str, session_id: &str) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE id = $1 AND user_id = $2")
            .bind(session_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_auth_sessions_for_user(&self, user_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_chat(&self, owner_id: &str, title: &str) -> PortResult<Chat> {
        let record = sqlx::query_as::<_, ChatRecord>(&format!(
            "INSERT INTO chats (id, owner_id, title, favorite) VALUES ($1, $2, $3, FALSE) RETURNING {}",
            CHAT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(title)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn get_chat(&self, chat_id: Uuid) -> PortResult<Chat> {
        let record = sqlx::query_as::<_, ChatRecord>(&format!(
            "SELECT {} FROM chats WHERE id = $1",
            CHAT_COLUMNS
        ))
        .bind(chat_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Chat {} not found", chat_id)))?;
        Ok(record.to_domain())
    }

    async fn list_chats(&self, owner_id: &str) -> PortResult<Vec<Chat>> {
        let records = sqlx::query_as::<_, ChatRecord>(&format!(
            "SELECT {} FROM chats WHERE owner_id = $1 ORDER BY updated_at DESC",
            CHAT_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ChatRecord::to_domain).collect())
    }

    async fn set_favorite(&self, chat_id: Uuid, favorite: bool) -> PortResult<()> {
        let result = sqlx::query("UPDATE chats SET favorite = $1 WHERE id = $2")
            .bind(favorite)
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Chat {} not found", chat_id)));
        }
        Ok(())
    }

    async fn delete_chat(&self, chat_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query("DELETE FROM messages WHERE chat_id = $1")
            .bind(chat_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        let result = sqlx::query("DELETE FROM chats WHERE id = $1")
            .bind(chat_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            return Err(PortError::NotFound(format!("Chat {} not found", chat_id)));
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn append_message(&self, chat_id: Uuid, role: Role, content: &str) -> PortResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(&format!(
            "INSERT INTO messages (id, chat_id, role, content) VALUES ($1, $2, $3, $4) RETURNING {}",
            MESSAGE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(chat_id)
        .bind(role.as_str())
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let missing_chat = e
                .as_database_error()
                .is_some_and(|db_err| db_err.is_foreign_key_violation());
            if missing_chat {
                PortError::NotFound(format!("Chat {} not found", chat_id))
            } else {
                unexpected(e)
            }
        })?;

        sqlx::query("UPDATE chats SET updated_at = now() WHERE id = $1")
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        record.to_domain()
    }

    async fn list_messages(&self, chat_id: Uuid) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {} FROM messages WHERE chat_id = $1 ORDER BY created_at ASC, seq ASC",
            MESSAGE_COLUMNS
        ))
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        messages_to_domain(records)
    }

    async fn set_feedback(
        &self,
        message_id: Uuid,
        feedback: Option<Feedback>,
        user_comment: Option<&str>,
    ) -> PortResult<()> {
        let result =
            sqlx::query("UPDATE messages SET feedback = $1, user_comment = $2 WHERE id = $3")
                .bind(feedback.map(|f| f.as_str()))
                .bind(user_comment)
                .bind(message_id)
                .execute(&self.pool)
                .await
                .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Message {} not found", message_id)));
        }
        Ok(())
    }

    async fn list_messages_for_owner(&self, owner_id: &str) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT m.id, m.chat_id, m.role, m.content, m.feedback, m.user_comment, m.created_at \
             FROM messages m JOIN chats c ON m.chat_id = c.id \
             WHERE c.owner_id = $1 \
             ORDER BY m.chat_id, m.created_at ASC, m.seq ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        messages_to_domain(records)
    }

    async fn create_blog(&self, owner_id: &str, draft: &BlogDraft, slug: &str) -> PortResult<Blog> {
        let record = sqlx::query_as::<_, BlogRecord>(&format!(
            "INSERT INTO blogs (id, owner_id, title, content, slug) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            BLOG_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_blogs(&self) -> PortResult<Vec<Blog>> {
        let records = sqlx::query_as::<_, BlogRecord>(&format!(
            "SELECT {} FROM blogs ORDER BY created_at DESC",
            BLOG_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(BlogRecord::to_domain).collect())
    }

    async fn find_blog(&self, id_or_slug: &str) -> PortResult<Blog> {
        let record = sqlx::query_as::<_, BlogRecord>(&format!(
            "SELECT {} FROM blogs WHERE id = $1 OR slug = $2 LIMIT 1",
            BLOG_COLUMNS
        ))
        .bind(Uuid::parse_str(id_or_slug).ok())
        .bind(id_or_slug)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Blog {} not found", id_or_slug)))?;
        Ok(record.to_domain())
    }

    async fn update_blog(&self, blog_id: Uuid, draft: &BlogDraft) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE blogs SET title = $1, content = $2, updated_at = now() WHERE id = $3",
        )
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(blog_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Blog {} not found", blog_id)));
        }
        Ok(())
    }

    async fn delete_blog(&self, blog_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM blogs WHERE id = $1")
            .bind(blog_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_product(&self, owner_id: &str, draft: &ProductDraft) -> PortResult<Product> {
        let record = sqlx::query_as::<_, ProductRecord>(&format!(
            "INSERT INTO products (id, owner_id, name, description, price, stock, image) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(&draft.price)
        .bind(&draft.stock)
        .bind(&draft.image)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn list_products(&self) -> PortResult<Vec<Product>> {
        let records = sqlx::query_as::<_, ProductRecord>(&format!(
            "SELECT {} FROM products ORDER BY created_at DESC",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(ProductRecord::to_domain).collect())
    }

    async fn update_product(&self, product_id: Uuid, draft: &ProductDraft) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE products SET name = $1, description = $2, price = $3, stock = $4, image = $5, \
             updated_at = now() WHERE id = $6",
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(&draft.price)
        .bind(&draft.stock)
        .bind(&draft.image)
        .bind(product_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Product {} not found", product_id)));
        }
        Ok(())
    }

    async fn delete_product(&self, product_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
