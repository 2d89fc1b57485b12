pub mod completion;
pub mod db;
pub mod memory;
pub mod mock_llm;
pub mod title_llm;

pub use completion::HttpCompletionAdapter;
pub use db::DbAdapter;
pub use memory::InMemoryDb;
pub use mock_llm::MockCompletionAdapter;
pub use title_llm::CompletionTitleAdapter;
