pub mod constants;
pub mod error;
pub mod fallback;
pub mod llm;
pub mod orchestrator;
pub mod router;
pub mod scheduler;
pub mod settings;
pub mod store;
pub mod terminal;
pub mod time;
pub mod tools;
