pub mod assist;
pub mod domain;
pub mod intent;
pub mod materializer;
pub mod pairing;
pub mod ports;
pub mod slug;

pub use domain::{
    Blog, BlogDraft, Chat, Feedback, FeedbackEntry, Message, Product, ProductDraft, Role, User,
    UserCredentials,
};
pub use intent::Intent;
pub use ports::{
    CompletionRequest, CompletionService, DatabaseService, PortError, PortResult,
    TitleGenerationService, TokenStream,
};
