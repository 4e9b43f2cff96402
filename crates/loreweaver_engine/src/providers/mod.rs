pub mod groq;
pub mod mock;
pub mod ollama;

pub use groq::GroqProvider;
pub use mock::{MockCritic, MockExecutor, MockPlanner};
pub use ollama::OllamaProvider;
