//! crates/chat_studio_core/src/assist.rs
//!
//! Prompts for the one-shot product helpers: drafting a product from a
//! free-text description and polishing a single product field.

use std::str::FromStr;

use crate::ports::PortError;

/// Token budget of a generated product.
pub const GENERATE_MAX_TOKENS: u32 = 500;
/// Token budget of an improved field.
pub const IMPROVE_MAX_TOKENS: u32 = 300;

/// A product field the improver knows how to rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductField {
    Name,
    Description,
}

impl FromStr for ProductField {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(ProductField::Name),
            "description" => Ok(ProductField::Description),
            other => Err(PortError::InvalidInput(format!(
                "field must be 'name' or 'description', got '{}'",
                other
            ))),
        }
    }
}

/// What is already known about the product being edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductContext {
    pub name: String,
    pub description: String,
    pub price: String,
}

pub fn generate_product_prompt(description: &str) -> String {
    format!(
        "Generate a product based on this description: \"{}\"\n\n\
         Format your response EXACTLY as JSON:\n\
         {{\n  \"name\": \"product name\",\n  \"description\": \"detailed product description\",\n  \
         \"price\": \"suggested price as number\",\n  \"stock\": \"suggested stock quantity as number\",\n  \
         \"image\": \"suggested image URL or empty string\"\n}}\n\n\
         Only return the JSON, nothing else.",
        description
    )
}

pub fn improve_prompt(field: ProductField, value: &str, context: &ProductContext) -> String {
    match field {
        ProductField::Name => format!(
            "Improve this product name to be more appealing and professional: \"{}\"\n\n\
             Context: {}\n\n\
             Return ONLY the improved name, nothing else.",
            value, context.description
        ),
        ProductField::Description => format!(
            "Improve this product description to be more detailed, engaging, and professional: \"{}\"\n\n\
             Product name: {}\n\
             Price: ${}\n\n\
             Return ONLY the improved description, nothing else.",
            value, context.name, context.price
        ),
    }
}
