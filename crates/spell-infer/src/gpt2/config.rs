use crate::{InferError, Result};
use serde::Deserialize;
use std::path::Path;

/// GPT-2 hyperparameters as found in a Hugging Face `config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct Gpt2Config {
    pub vocab_size: usize,
    #[serde(default)]
    pub n_positions: Option<usize>,
    /// Older configs carry the context length here as well.
    #[serde(default)]
    pub n_ctx: Option<usize>,
    pub n_embd: usize,
    pub n_layer: usize,
    pub n_head: usize,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
    #[serde(default = "default_eos_token_id")]
    pub bos_token_id: u32,
    #[serde(default = "default_eos_token_id")]
    pub eos_token_id: u32,
    #[serde(default)]
    pub pad_token_id: Option<u32>,
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

fn default_eos_token_id() -> u32 {
    50256
}

impl Gpt2Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            InferError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| InferError::Config(format!("Invalid GPT-2 config: {}", e)))?;
        if config.context_length() == 0 {
            return Err(InferError::Config(
                "config declares neither n_positions nor n_ctx".to_string(),
            ));
        }
        if config.n_head == 0 || config.n_embd % config.n_head != 0 {
            return Err(InferError::Config(format!(
                "n_embd {} is not divisible by n_head {}",
                config.n_embd, config.n_head
            )));
        }
        Ok(config)
    }

    /// Padding falls back to end-of-sequence when the model declares none.
    /// Used for padding only; decoding stops on `eos_token_id` alone.
    pub fn resolved_pad_token_id(&self) -> u32 {
        self.pad_token_id.unwrap_or(self.eos_token_id)
    }

    /// Maximum sequence length the position embedding covers.
    pub fn context_length(&self) -> usize {
        self.n_positions.or(self.n_ctx).unwrap_or(0)
    }

    pub fn head_dim(&self) -> usize {
        self.n_embd / self.n_head
    }

    /// The 124M-parameter base model.
    pub fn gpt2_small() -> Self {
        Self {
            vocab_size: 50257,
            n_positions: Some(1024),
            n_ctx: Some(1024),
            n_embd: 768,
            n_layer: 12,
            n_head: 12,
            layer_norm_epsilon: 1e-5,
            bos_token_id: 50256,
            eos_token_id: 50256,
            pad_token_id: None,
        }
    }
}
