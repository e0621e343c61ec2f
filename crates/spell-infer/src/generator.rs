use crate::{Result, SamplingConfig};
use std::sync::Arc;

/// A pretrained model/tokenizer pair behind a single generation call.
///
/// Implementations return the prompt followed by exactly one sampled
/// continuation. The sampling configuration belongs to the call; an
/// implementation must not keep it around for later calls.
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str, config: &SamplingConfig) -> Result<String>;
}

impl<T: TextGenerator + ?Sized> TextGenerator for &T {
    fn generate(&self, prompt: &str, config: &SamplingConfig) -> Result<String> {
        (**self).generate(prompt, config)
    }
}

impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    fn generate(&self, prompt: &str, config: &SamplingConfig) -> Result<String> {
        (**self).generate(prompt, config)
    }
}

impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    fn generate(&self, prompt: &str, config: &SamplingConfig) -> Result<String> {
        (**self).generate(prompt, config)
    }
}
