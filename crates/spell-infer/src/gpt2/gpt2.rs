use super::model::{Cache, Gpt2Model};
use super::tokenizer::load_tokenizer;
use super::Gpt2Config;
use crate::{InferError, Result, SamplingConfig, TextGenerator};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;

pub const CONFIG_FILE: &str = "config.json";
pub const SAFETENSORS_FILE: &str = "model.safetensors";
pub const PYTORCH_FILE: &str = "pytorch_model.bin";

/// GPT-2 causal language model for prompt continuation.
///
/// The network and tokenizer are immutable once loaded and shared through
/// `Arc`, so a `Gpt2` can be cloned freely and called from several threads.
/// Every call builds its own KV cache and sampler from the `SamplingConfig`
/// it is given. Only end-of-sequence stops decoding; a declared pad token
/// is ordinary output.
#[derive(Clone)]
pub struct Gpt2 {
    model: Arc<Gpt2Model>,
    tokenizer: Arc<Tokenizer>,
    config: Arc<Gpt2Config>,
}

impl Gpt2 {
    /// Load a GPT-2 checkpoint from a Hugging Face style directory.
    ///
    /// # Arguments
    /// * `dir` - Directory holding `config.json`, the tokenizer files and
    ///   `model.safetensors` (or `pytorch_model.bin`)
    /// * `device` - Device to run inference on (CPU or CUDA)
    ///
    /// # Errors
    /// Returns `InferError::Config` if any of the files is missing or
    /// cannot be parsed.
    pub fn load(dir: impl AsRef<Path>, device: Device) -> Result<Self> {
        let dir = dir.as_ref();
        let started = Instant::now();

        let config = Gpt2Config::from_file(dir.join(CONFIG_FILE))?;
        let tokenizer = load_tokenizer(dir)?;

        let safetensors = dir.join(SAFETENSORS_FILE);
        let pytorch = dir.join(PYTORCH_FILE);
        let vb = if safetensors.exists() {
            // SAFETY: the file is not modified while the model is mapped.
            unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, &device) }
                .map_err(|e| InferError::Config(format!("Failed to map weights: {}", e)))?
        } else if pytorch.exists() {
            VarBuilder::from_pth(&pytorch, DType::F32, &device)
                .map_err(|e| InferError::Config(format!("Failed to read weights: {}", e)))?
        } else {
            return Err(InferError::Config(format!(
                "no {} or {} in {}",
                SAFETENSORS_FILE,
                PYTORCH_FILE,
                dir.display()
            )));
        };

        let model = Gpt2Model::load(vb, &config)
            .map_err(|e| InferError::Config(format!("Failed to load model weights: {}", e)))?;

        log::info!(
            "Loaded GPT-2 from {} ({} layers, {} heads, vocab {}) in {:.2?}",
            dir.display(),
            config.n_layer,
            config.n_head,
            config.vocab_size,
            started.elapsed()
        );

        Ok(Self::from_parts(model, tokenizer, config))
    }

    /// Assemble an adapter from an already built network.
    pub fn from_parts(model: Gpt2Model, tokenizer: Tokenizer, config: Gpt2Config) -> Self {
        Self {
            model: Arc::new(model),
            tokenizer: Arc::new(tokenizer),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Gpt2Config {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Generate one continuation of `prompt` on the tokio blocking pool.
    pub async fn forward(&self, prompt: &str, config: &SamplingConfig) -> Result<String> {
        let this = self.clone();
        let prompt = prompt.to_string();
        let config = *config;
        tokio::task::spawn_blocking(move || this.generate(&prompt, &config))
            .await
            .map_err(|e| InferError::Runtime(format!("Task join error: {}", e)))?
    }

    /// Sample continuation token ids after `prompt_ids`.
    fn sample_tokens(&self, prompt_ids: &[u32], config: &SamplingConfig) -> Result<Vec<u32>> {
        let device = self.model.device();
        let eos = self.config.eos_token_id;
        let seed = config.resolve_seed();
        let mut logits_processor = LogitsProcessor::from_sampling(seed, config.sampling());
        let mut cache = Cache::new(self.config.n_layer);

        let mut input = Tensor::new(prompt_ids, device)?.unsqueeze(0)?;
        let mut generated = Vec::new();
        while prompt_ids.len() + generated.len() < config.max_length {
            let logits = self
                .model
                .forward(&input, &mut cache)
                .map_err(|e| {
                    InferError::Generation(format!(
                        "Model forward failed at token {}: {}",
                        generated.len(),
                        e
                    ))
                })?;
            let next_token = logits_processor
                .sample(&logits)
                .map_err(|e| InferError::Generation(format!("Sampling failed: {}", e)))?;
            if next_token == eos {
                break;
            }
            generated.push(next_token);
            input = Tensor::new(&[next_token], device)?.unsqueeze(0)?;
        }
        Ok(generated)
    }
}

impl std::fmt::Debug for Gpt2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gpt2")
            .field("n_layer", &self.config.n_layer)
            .field("vocab_size", &self.config.vocab_size)
            .field("device", self.model.device())
            .finish_non_exhaustive()
    }
}

impl TextGenerator for Gpt2 {
    /// Returns `prompt` followed by one sampled continuation.
    ///
    /// `max_length` bounds prompt plus continuation in tokens. A prompt that
    /// already fills it comes back unchanged.
    fn generate(&self, prompt: &str, config: &SamplingConfig) -> Result<String> {
        if prompt.is_empty() {
            return Err(InferError::Generation("Prompt cannot be empty".to_string()));
        }
        config.validate(self.config.context_length())?;

        let encoding = self
            .tokenizer
            .encode(prompt, false)
            .map_err(|e| InferError::Tokenizer(format!("Failed to encode prompt: {}", e)))?;
        let prompt_ids = encoding.get_ids();
        if prompt_ids.is_empty() {
            return Err(InferError::Generation(
                "Tokenization produced no tokens".to_string(),
            ));
        }
        if prompt_ids.len() >= config.max_length {
            log::warn!(
                "Prompt is {} tokens but max_length is {}; nothing to generate",
                prompt_ids.len(),
                config.max_length
            );
            return Ok(prompt.to_string());
        }

        let started = Instant::now();
        let generated = self.sample_tokens(prompt_ids, config)?;
        let continuation = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| InferError::Tokenizer(format!("Failed to decode tokens: {}", e)))?;

        log::debug!(
            "Generated {} tokens after a {}-token prompt in {:.2?} (temperature {}, top_k {}, top_p {})",
            generated.len(),
            prompt_ids.len(),
            started.elapsed(),
            config.temperature,
            config.top_k,
            config.top_p
        );
        Ok(format!("{}{}", prompt, continuation))
    }
}
