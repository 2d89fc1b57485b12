pub mod auth;
pub mod content;
pub mod error;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod stream_handler;
pub mod stream_task;

pub use middleware::require_auth;
pub use stream_handler::chat_stream_handler;

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;

use state::AppState;

/// Builds the API router: public auth routes plus the session-protected `/api` routes.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/chat/stream", post(chat_stream_handler))
        .route("/api/chat", post(rest::complete_handler))
        .route("/api/chats", get(rest::list_chats_handler))
        .route(
            "/api/chat/{id}",
            get(rest::get_chat_messages_handler)
                .patch(rest::update_chat_handler)
                .delete(rest::delete_chat_handler),
        )
        .route("/api/messages/{id}/feedback", patch(rest::feedback_handler))
        .route("/api/ai-performance", get(rest::ai_performance_handler))
        .route(
            "/api/blogs",
            post(content::create_blog_handler).get(content::list_blogs_handler),
        )
        .route(
            "/api/blogs/{id}",
            get(content::get_blog_handler)
                .put(content::update_blog_handler)
                .delete(content::delete_blog_handler),
        )
        .route(
            "/api/products",
            post(content::create_product_handler).get(content::list_products_handler),
        )
        .route(
            "/api/products/{id}",
            put(content::update_product_handler)
                .delete(content::delete_product_handler),
        )
        .route("/api/ai/generate-product", post(content::generate_product_handler))
        .route("/api/ai/improve-product", post(content::improve_product_handler))
        .route(
            "/api/sessions",
            get(auth::list_sessions_handler).delete(auth::terminate_sessions_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(rest::not_found_handler)
        .with_state(app_state)
}
