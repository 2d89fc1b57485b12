//! crates/chat_studio_core/src/materializer.rs
//!
//! Turns the accumulated text of a completion into a blog post or product.
//!
//! Everything here is pure: extraction returns a `ParseFailure` instead of an
//! error, and the caller decides how to persist a successful draft. A failed
//! extraction never fails the chat turn; the raw text is kept and annotated.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::domain::{Blog, BlogDraft, Product, ProductDraft};
use crate::intent::Intent;

/// Appended to the raw text when a blog turn produced no usable block.
pub const BLOG_FORMAT_WARNING: &str = "\n\n⚠️ Note: this blog post was not saved automatically \
because the expected TITLE:/CONTENT: format was not found in the response.";

/// Appended to the raw text when a product turn produced no usable JSON.
pub const PRODUCT_FORMAT_WARNING: &str = "\n\n⚠️ Note: this product was not saved automatically \
because no valid product JSON was found in the response.";

/// Why a completion could not be turned into an entity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    #[error("no TITLE:/CONTENT: block found")]
    MissingBlogFields,
    #[error("no JSON object found")]
    MissingJson,
    #[error("invalid product JSON: {0}")]
    InvalidJson(String),
    #[error("product JSON is missing '{0}'")]
    MissingField(&'static str),
}

/// What the finalizing step should do with a turn's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialization {
    /// Keep the text as it is.
    Passthrough,
    Blog(BlogDraft),
    Product(ProductDraft),
    /// The intent asked for an entity but the text did not contain one.
    Unparsed(ParseFailure),
}

/// Decides how a turn's full text is materialized for its intent.
pub fn plan(intent: Intent, text: &str) -> Materialization {
    match intent {
        Intent::Plain | Intent::ManageProducts => Materialization::Passthrough,
        Intent::CreateBlog => match extract_blog(text) {
            Ok(draft) => Materialization::Blog(draft),
            Err(failure) => Materialization::Unparsed(failure),
        },
        Intent::CreateProduct => match extract_product(text) {
            Ok(draft) => Materialization::Product(draft),
            Err(failure) => Materialization::Unparsed(failure),
        },
    }
}

fn blog_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)TITLE:[ \t]*([^\r\n]*)\r?\n.*?CONTENT:[ \t]*(.*)")
            .expect("blog pattern is valid")
    })
}

/// Extracts a `TITLE:` line and the `CONTENT:` body that follows it.
pub fn extract_blog(text: &str) -> Result<BlogDraft, ParseFailure> {
    let captures = blog_regex()
        .captures(text)
        .ok_or(ParseFailure::MissingBlogFields)?;

    let title = captures
        .get(1)
        .map(|m| m.as_str().trim().trim_matches(|c| c == '*' || c == '"').trim())
        .unwrap_or_default();
    let content = captures.get(2).map(|m| m.as_str().trim()).unwrap_or_default();

    if title.is_empty() || content.is_empty() {
        return Err(ParseFailure::MissingBlogFields);
    }

    Ok(BlogDraft {
        title: title.to_string(),
        content: content.to_string(),
    })
}

/// Finds the first balanced `{...}` span, honouring braces inside JSON strings.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Extracts a product from the first JSON object in the text. Numeric price
/// and stock values are kept as their textual form.
pub fn extract_product(text: &str) -> Result<ProductDraft, ParseFailure> {
    let raw = first_json_object(text).ok_or(ParseFailure::MissingJson)?;
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ParseFailure::InvalidJson(e.to_string()))?;
    product_from_json(&value)
}

/// Validates an already-parsed product object.
pub fn product_from_json(value: &Value) -> Result<ProductDraft, ParseFailure> {
    let object = value
        .as_object()
        .ok_or_else(|| ParseFailure::InvalidJson("not an object".to_string()))?;

    let name = text_field(object, "name")
        .filter(|name| !name.is_empty())
        .ok_or(ParseFailure::MissingField("name"))?;
    let price = text_field(object, "price").ok_or(ParseFailure::MissingField("price"))?;
    let stock = text_field(object, "stock").ok_or(ParseFailure::MissingField("stock"))?;
    let description = text_field(object, "description").unwrap_or_default();
    let image = text_field(object, "image").filter(|url| !url.is_empty());

    Ok(ProductDraft {
        name,
        description,
        price,
        stock,
        image,
    })
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Where a published blog post can be read.
pub fn blog_url(public_base_url: &str, slug: &str) -> String {
    format!("{}/blogs/{}", public_base_url.trim_end_matches('/'), slug)
}

pub fn blog_confirmation(blog: &Blog, url: &str) -> String {
    format!(
        "✅ Blog post created!\n\n**{}**\n\nYou can read it here: {}",
        blog.title, url
    )
}

pub fn product_confirmation(product: &Product) -> String {
    format!(
        "✅ Product created!\n\n- **Name:** {}\n- **Price:** {}\n- **Stock:** {}\n- **Description:** {}",
        product.name, product.price, product.stock, product.description
    )
}

/// The visible content of a turn whose entity could not be extracted.
pub fn annotate_unparsed(raw: &str, intent: Intent) -> String {
    match intent {
        Intent::CreateBlog => format!("{}{}", raw, BLOG_FORMAT_WARNING),
        Intent::CreateProduct => format!("{}{}", raw, PRODUCT_FORMAT_WARNING),
        Intent::Plain | Intent::ManageProducts => raw.to_string(),
    }
}
