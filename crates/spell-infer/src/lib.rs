pub mod error;
pub mod generator;
pub mod gpt2;
pub mod hub;
pub mod inference;
pub mod sampling;

pub use error::{InferError, Result};
pub use generator::TextGenerator;
pub use gpt2::{Gpt2, Gpt2Config};
pub use hub::Hub;
pub use inference::Inference;
pub use sampling::SamplingConfig;
