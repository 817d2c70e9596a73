pub mod config;
pub mod cost;
pub mod database;
pub mod errors;
pub mod eval;
pub mod llm;
pub mod logging;
pub mod models;
pub mod output;
pub mod pipeline;

pub use config::AppConfig;
pub use errors::QuizGenError;
pub use errors::Result;
