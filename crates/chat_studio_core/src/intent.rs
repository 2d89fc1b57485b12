//! crates/chat_studio_core/src/intent.rs
//!
//! Decides what a chat turn is for and reshapes the user's message into the
//! prompt sent to the completion backend.
//!
//! Classification walks an ordered list of named rules and the first one that
//! fires wins. The rules are heuristics: a message such as "this costs me 3
//! hours and I have 10 units of patience left" will be read as a product
//! description.

use regex::Regex;
use std::sync::OnceLock;

/// The purpose of a single chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Plain,
    CreateBlog,
    CreateProduct,
    ManageProducts,
}

impl Intent {
    /// Maps an explicit context tag sent by the client onto an intent.
    pub fn from_context_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "create-blog" => Some(Intent::CreateBlog),
            "create-product" => Some(Intent::CreateProduct),
            "manage-products" => Some(Intent::ManageProducts),
            _ => None,
        }
    }
}

const BLOG_TRIGGERS: &[&str] = &[
    "create blog",
    "create a blog",
    "write blog",
    "write a blog",
    "generate blog",
    "generate a blog",
    "make blog",
    "make a blog",
    "blog post",
];

const PRODUCT_TRIGGERS: &[&str] = &[
    "create product",
    "create a product",
    "add product",
    "add a product",
    "new product",
    "make product",
    "make a product",
    "generate product",
    "generate a product",
];

/// The message as seen by the rules.
pub struct TurnInput<'a> {
    pub message: &'a str,
    pub lowered: String,
    pub context: Option<&'a str>,
}

impl<'a> TurnInput<'a> {
    pub fn new(message: &'a str, context: Option<&'a str>) -> Self {
        Self {
            message,
            lowered: message.to_lowercase(),
            context,
        }
    }
}

/// A named classification predicate.
pub struct Rule {
    pub name: &'static str,
    pub decide: fn(&TurnInput<'_>) -> Option<Intent>,
}

/// Classification rules in priority order.
pub const RULES: &[Rule] = &[
    Rule {
        name: "explicit-context",
        decide: explicit_context,
    },
    Rule {
        name: "blog-trigger",
        decide: blog_trigger,
    },
    Rule {
        name: "product-trigger",
        decide: product_trigger,
    },
    Rule {
        name: "product-description",
        decide: product_description,
    },
];

pub fn explicit_context(input: &TurnInput<'_>) -> Option<Intent> {
    input.context.and_then(Intent::from_context_tag)
}

pub fn blog_trigger(input: &TurnInput<'_>) -> Option<Intent> {
    contains_any(&input.lowered, BLOG_TRIGGERS).then_some(Intent::CreateBlog)
}

pub fn product_trigger(input: &TurnInput<'_>) -> Option<Intent> {
    contains_any(&input.lowered, PRODUCT_TRIGGERS).then_some(Intent::CreateProduct)
}

/// Fires when the message mentions a price together with either a stock
/// quantity or an image URL.
pub fn product_description(input: &TurnInput<'_>) -> Option<Intent> {
    if !price_regex().is_match(&input.lowered) {
        return None;
    }
    let has_stock = stock_regex().is_match(&input.lowered);
    let has_image = find_image_url(input.message).is_some();
    (has_stock || has_image).then_some(Intent::CreateProduct)
}

/// Returns the winning rule's name alongside the intent, or `None` when no
/// rule fires.
pub fn decide(message: &str, context: Option<&str>) -> Option<(&'static str, Intent)> {
    let input = TurnInput::new(message, context);
    RULES
        .iter()
        .find_map(|rule| (rule.decide)(&input).map(|intent| (rule.name, intent)))
}

pub fn classify(message: &str, context: Option<&str>) -> Intent {
    decide(message, context)
        .map(|(_, intent)| intent)
        .unwrap_or(Intent::Plain)
}

/// Finds the first image URL in free text.
pub fn find_image_url(text: &str) -> Option<&str> {
    image_url_regex().find(text).map(|m| m.as_str())
}

/// Builds the prompt actually sent to the completion backend for a turn.
pub fn shape_prompt(intent: Intent, message: &str) -> String {
    match intent {
        Intent::Plain => message.to_string(),
        Intent::CreateBlog => format!(
            "You are a blog creation assistant. Generate a blog post based on: \"{}\"\n\
             IMPORTANT: Format your answer exactly as:\n\
             TITLE: [title on a single line]\n\
             CONTENT: [markdown content]",
            message
        ),
        Intent::CreateProduct => {
            let image = find_image_url(message).unwrap_or("");
            let image_json =
                serde_json::to_string(image).unwrap_or_else(|_| "\"\"".to_string());
            format!(
                "Create a product from: \"{}\". Return ONLY a JSON object on a single line, \
                 nothing else: {{\"name\":\"\",\"description\":\"\",\"price\":\"\",\"stock\":\"\",\"image\":{}}}",
                message, image_json
            )
        }
        Intent::ManageProducts => format!(
            "You are a product catalog advisor. Help with this request about managing \
             existing products: \"{}\". Give practical advice in plain prose. Do not \
             output JSON and do not create new products.",
            message
        ),
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn price_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(price|priced|pricing|cost|costs|usd|eur|dollars?)\b|[$€£]\s?\d")
            .expect("price pattern is valid")
    })
}

fn stock_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(stock|quantity|qty|units|inventory|pieces|pcs)\b")
            .expect("stock pattern is valid")
    })
}

fn image_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)https?://[^\s"'<>]+?\.(?:png|jpe?g|gif|webp|svg|avif)(?:\?[^\s"'<>]*)?"#)
            .expect("image url pattern is valid")
    })
}
