use crate::{InferError, Result};
use std::collections::HashMap;
use std::path::Path;
use tokenizers::models::bpe::BPE;
use tokenizers::pre_tokenizers::byte_level::ByteLevel;
use tokenizers::{AddedToken, Tokenizer};

pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const VOCAB_FILE: &str = "vocab.json";
pub const MERGES_FILE: &str = "merges.txt";
pub const ADDED_TOKENS_FILE: &str = "added_tokens.json";

/// Load the tokenizer stored in a model directory.
///
/// Prefers `tokenizer.json`. Older GPT-2 checkpoints only ship the slow
/// tokenizer files, in which case a byte-level BPE is assembled from
/// `vocab.json` + `merges.txt` and any `added_tokens.json` entries.
pub fn load_tokenizer(dir: &Path) -> Result<Tokenizer> {
    let path = dir.join(TOKENIZER_FILE);
    if path.exists() {
        return Tokenizer::from_file(&path)
            .map_err(|e| InferError::Config(format!("Failed to load tokenizer: {}", e)));
    }

    let vocab = dir.join(VOCAB_FILE);
    let merges = dir.join(MERGES_FILE);
    if !vocab.exists() || !merges.exists() {
        return Err(InferError::Config(format!(
            "no {} or {} + {} in {}",
            TOKENIZER_FILE,
            VOCAB_FILE,
            MERGES_FILE,
            dir.display()
        )));
    }

    let to_str = |p: &Path| p.to_string_lossy().into_owned();
    let bpe = BPE::from_file(&to_str(&vocab), &to_str(&merges))
        .build()
        .map_err(|e| InferError::Config(format!("Failed to build BPE model: {}", e)))?;

    let mut tokenizer = Tokenizer::new(bpe);
    tokenizer.with_pre_tokenizer(Some(ByteLevel::default().add_prefix_space(false)));
    tokenizer.with_decoder(Some(ByteLevel::default()));

    let added = dir.join(ADDED_TOKENS_FILE);
    if added.exists() {
        let json = std::fs::read_to_string(&added)?;
        let tokens: HashMap<String, u32> = serde_json::from_str(&json)?;
        register_added_tokens(&mut tokenizer, tokens);
    }
    Ok(tokenizer)
}

/// Register added tokens in id order so they land on their declared ids.
fn register_added_tokens(tokenizer: &mut Tokenizer, tokens: HashMap<String, u32>) {
    let mut tokens: Vec<(String, u32)> = tokens.into_iter().collect();
    tokens.sort_by_key(|(_, id)| *id);
    let added: Vec<AddedToken> = tokens
        .into_iter()
        .map(|(content, _)| AddedToken::from(content, false))
        .collect();
    let count = tokenizer.add_tokens(&added);
    log::debug!("Registered {} added tokens", count);
}
