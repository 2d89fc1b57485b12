//! services/api/src/web/content.rs
//!
//! REST handlers for blog posts, catalog products, and the one-shot product
//! helpers backed by the completion service.

use crate::web::{
    error::{bad_request, http_error, port_error, ErrorBody, HttpError},
    rest::SuccessResponse,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use chat_studio_core::{
    assist::{self, ProductContext, ProductField},
    domain::{Blog, BlogDraft, Product, ProductDraft},
    materializer,
    ports::CompletionRequest,
    slug::generate_slug,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct BlogRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl BlogRequest {
    fn into_draft(self) -> Result<BlogDraft, HttpError> {
        match (non_blank(self.title), non_blank(self.content)) {
            (Some(title), Some(content)) => Ok(BlogDraft { title, content }),
            _ => Err(bad_request("title and content are required")),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlogView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Blog> for BlogView {
    fn from(blog: Blog) -> Self {
        Self {
            id: blog.id,
            title: blog.title,
            content: blog.content,
            slug: blog.slug,
            created_at: blog.created_at,
            updated_at: blog.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CreateBlogResponse {
    pub success: bool,
    pub slug: String,
}

/// Price and stock may be sent either as strings or as numbers.
#[derive(Deserialize, ToSchema, Debug, Clone)]
#[serde(untagged)]
pub enum TextOrNumber {
    Text(String),
    Number(f64),
}

impl TextOrNumber {
    fn into_text(self) -> String {
        match self {
            TextOrNumber::Text(text) => text.trim().to_string(),
            TextOrNumber::Number(number) => number.to_string(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<TextOrNumber>,
    pub stock: Option<TextOrNumber>,
    pub image: Option<String>,
}

impl ProductRequest {
    fn into_draft(self) -> Result<ProductDraft, HttpError> {
        let name = non_blank(self.name).ok_or_else(|| bad_request("name is required"))?;
        let price = self
            .price
            .map(TextOrNumber::into_text)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| bad_request("price is required"))?;
        let stock = self
            .stock
            .map(TextOrNumber::into_text)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| bad_request("stock is required"))?;
        Ok(ProductDraft {
            name,
            description: self.description.unwrap_or_default(),
            price,
            stock,
            image: non_blank(self.image),
        })
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: String,
    pub stock: String,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            stock: product.stock,
            image: product.image,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProductResponse {
    pub success: bool,
    pub product: ProductView,
}

#[derive(Deserialize, ToSchema)]
pub struct GenerateProductRequest {
    pub prompt: Option<String>,
}

/// A drafted product, not yet saved.
#[derive(Serialize, ToSchema)]
pub struct GeneratedProduct {
    pub name: String,
    pub description: String,
    pub price: String,
    pub stock: String,
    pub image: String,
}

impl From<ProductDraft> for GeneratedProduct {
    fn from(draft: ProductDraft) -> Self {
        Self {
            name: draft.name,
            description: draft.description,
            price: draft.price,
            stock: draft.stock,
            image: draft.image.unwrap_or_default(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct GenerateProductResponse {
    pub product: GeneratedProduct,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct ImproveContext {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<TextOrNumber>,
}

#[derive(Deserialize, ToSchema)]
pub struct ImproveProductRequest {
    /// `name` or `description`.
    pub field: Option<String>,
    pub value: Option<String>,
    #[serde(default)]
    pub context: Option<ImproveContext>,
}

#[derive(Serialize, ToSchema)]
pub struct ImproveProductResponse {
    pub improved: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

//=========================================================================================
// Blog Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/api/blogs",
    request_body = BlogRequest,
    responses(
        (status = 201, description = "Blog created", body = CreateBlogResponse),
        (status = 400, description = "Missing title or content", body = ErrorBody)
    )
)]
pub async fn create_blog_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    Json(req): Json<BlogRequest>,
) -> Result<(StatusCode, Json<CreateBlogResponse>), HttpError> {
    let draft = req.into_draft()?;
    let slug = generate_slug(&draft.title);
    let blog = app_state
        .db
        .create_blog(&user_id, &draft, &slug)
        .await
        .map_err(port_error)?;
    info!(blog_id = %blog.id, slug = %blog.slug, "Blog created.");
    Ok((
        StatusCode::CREATED,
        Json(CreateBlogResponse {
            success: true,
            slug: blog.slug,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/blogs",
    responses((status = 200, description = "All blogs, newest first", body = Vec<BlogView>))
)]
pub async fn list_blogs_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<BlogView>>, HttpError> {
    let blogs = app_state.db.list_blogs().await.map_err(port_error)?;
    Ok(Json(blogs.into_iter().map(BlogView::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/blogs/{id}",
    params(("id" = String, Path, description = "Blog id or slug")),
    responses(
        (status = 200, description = "The blog", body = BlogView),
        (status = 404, description = "Blog not found", body = ErrorBody)
    )
)]
pub async fn get_blog_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id_or_slug): Path<String>,
) -> Result<Json<BlogView>, HttpError> {
    let blog = app_state
        .db
        .find_blog(&id_or_slug)
        .await
        .map_err(port_error)?;
    Ok(Json(blog.into()))
}

#[utoipa::path(
    put,
    path = "/api/blogs/{id}",
    params(("id" = Uuid, Path, description = "Blog id")),
    request_body = BlogRequest,
    responses(
        (status = 200, description = "Blog updated", body = SuccessResponse),
        (status = 400, description = "Missing title or content", body = ErrorBody),
        (status = 404, description = "Blog not found", body = ErrorBody)
    )
)]
pub async fn update_blog_handler(
    State(app_state): State<Arc<AppState>>,
    Path(blog_id): Path<Uuid>,
    Json(req): Json<BlogRequest>,
) -> Result<Json<SuccessResponse>, HttpError> {
    let draft = req.into_draft()?;
    app_state
        .db
        .update_blog(blog_id, &draft)
        .await
        .map_err(port_error)?;
    Ok(Json(SuccessResponse { success: true }))
}

#[utoipa::path(
    delete,
    path = "/api/blogs/{id}",
    params(("id" = Uuid, Path, description = "Blog id")),
    responses((status = 200, description = "Blog deleted", body = SuccessResponse))
)]
pub async fn delete_blog_handler(
    State(app_state): State<Arc<AppState>>,
    Path(blog_id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, HttpError> {
    app_state.db.delete_blog(blog_id).await.map_err(port_error)?;
    Ok(Json(SuccessResponse { success: true }))
}

//=========================================================================================
// Product Handlers
//=========================================================================================

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Missing name, price, or stock", body = ErrorBody)
    )
)]
pub async fn create_product_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<String>,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), HttpError> {
    let draft = req.into_draft()?;
    let product = app_state
        .db
        .create_product(&user_id, &draft)
        .await
        .map_err(port_error)?;
    info!(product_id = %product.id, "Product created.");
    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            success: true,
            product: product.into(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/products",
    responses((status = 200, description = "All products, newest first", body = Vec<ProductView>))
)]
pub async fn list_products_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProductView>>, HttpError> {
    let products = app_state.db.list_products().await.map_err(port_error)?;
    Ok(Json(products.into_iter().map(ProductView::from).collect()))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = ProductRequest,
    responses(
        (status = 200, description = "Product updated", body = SuccessResponse),
        (status = 400, description = "Missing name, price, or stock", body = ErrorBody),
        (status = 404, description = "Product not found", body = ErrorBody)
    )
)]
pub async fn update_product_handler(
    State(app_state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<SuccessResponse>, HttpError> {
    let draft = req.into_draft()?;
    app_state
        .db
        .update_product(product_id, &draft)
        .await
        .map_err(port_error)?;
    Ok(Json(SuccessResponse { success: true }))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses((status = 200, description = "Product deleted", body = SuccessResponse))
)]
pub async fn delete_product_handler(
    State(app_state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<SuccessResponse>, HttpError> {
    app_state
        .db
        .delete_product(product_id)
        .await
        .map_err(port_error)?;
    Ok(Json(SuccessResponse { success: true }))
}

//=========================================================================================
// Product Helpers
//=========================================================================================

/// Drafts a product from a free-text description. Nothing is saved.
#[utoipa::path(
    post,
    path = "/api/ai/generate-product",
    request_body = GenerateProductRequest,
    responses(
        (status = 200, description = "Drafted product", body = GenerateProductResponse),
        (status = 400, description = "Missing prompt", body = ErrorBody),
        (status = 500, description = "AI service failed or returned no usable product", body = ErrorBody)
    )
)]
pub async fn generate_product_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<GenerateProductRequest>,
) -> Result<Json<GenerateProductResponse>, HttpError> {
    let description = non_blank(req.prompt).ok_or_else(|| bad_request("prompt is required"))?;
    let request = CompletionRequest::new(
        assist::generate_product_prompt(&description),
        assist::GENERATE_MAX_TOKENS,
        app_state.config.ai_temperature,
    );
    let text = app_state
        .completion
        .complete(&request)
        .await
        .map_err(port_error)?;

    let draft = materializer::extract_product(&text).map_err(|failure| {
        warn!("Generated product could not be parsed: {}", failure);
        http_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to parse AI response",
        )
    })?;
    Ok(Json(GenerateProductResponse {
        product: draft.into(),
    }))
}

/// Rewrites a product's name or description.
#[utoipa::path(
    post,
    path = "/api/ai/improve-product",
    request_body = ImproveProductRequest,
    responses(
        (status = 200, description = "Improved text", body = ImproveProductResponse),
        (status = 400, description = "Unknown field or missing value", body = ErrorBody),
        (status = 500, description = "AI service failed", body = ErrorBody)
    )
)]
pub async fn improve_product_handler(
    State(app_state): State<Arc<AppState>>,
    Json(req): Json<ImproveProductRequest>,
) -> Result<Json<ImproveProductResponse>, HttpError> {
    let field = req
        .field
        .as_deref()
        .unwrap_or_default()
        .parse::<ProductField>()
        .map_err(port_error)?;
    let value = non_blank(req.value).ok_or_else(|| bad_request("value is required"))?;
    let context = req.context.unwrap_or_default();
    let context = ProductContext {
        name: context.name.unwrap_or_default(),
        description: context.description.unwrap_or_default(),
        price: context
            .price
            .map(TextOrNumber::into_text)
            .unwrap_or_default(),
    };

    let request = CompletionRequest::new(
        assist::improve_prompt(field, &value, &context),
        assist::IMPROVE_MAX_TOKENS,
        app_state.config.ai_temperature,
    );
    let improved = app_state
        .completion
        .complete(&request)
        .await
        .map_err(port_error)?;
    Ok(Json(ImproveProductResponse {
        improved: improved.trim().to_string(),
    }))
}
