pub mod defaults;
pub mod engine;
mod error;
pub mod stream;
pub mod throttle;
mod tokenize;

pub use engine::{load_tokenizer, EngineConfig, LoadedTokenizer};
pub use error::Result;
pub use tokenize::*;
