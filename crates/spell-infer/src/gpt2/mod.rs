mod config;
pub(crate) mod gpt2;
pub mod model;
pub mod tokenizer;

pub use config::Gpt2Config;
pub use gpt2::Gpt2;

#[cfg(test)]
#[path = "tests/gpt2_test.rs"]
mod gpt2_test;
