use crate::gpt2::gpt2::{CONFIG_FILE, PYTORCH_FILE, SAFETENSORS_FILE};
use crate::gpt2::tokenizer::{ADDED_TOKENS_FILE, MERGES_FILE, TOKENIZER_FILE, VOCAB_FILE};
use crate::{InferError, Result};
use reqwest::StatusCode;
use std::path::{Path, PathBuf};

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_REVISION: &str = "main";

/// Fetches model repositories from a Hugging Face compatible hub into a
/// local cache.
///
/// Files already present in the cache are reused without touching the
/// network. The access credential is optional; it only matters for gated
/// or private repositories.
#[derive(Debug, Clone)]
pub struct Hub {
    client: reqwest::Client,
    endpoint: String,
    cache_dir: PathBuf,
    revision: String,
    token: Option<String>,
}

impl Hub {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            cache_dir: cache_dir.into(),
            revision: DEFAULT_REVISION.to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Local directory for `repo` at the configured revision.
    pub fn repo_dir(&self, repo: &str) -> PathBuf {
        self.cache_dir
            .join(repo.replace('/', "--"))
            .join(&self.revision)
    }

    pub fn file_url(&self, repo: &str, file: &str) -> String {
        format!("{}/{}/resolve/{}/{}", self.endpoint, repo, self.revision, file)
    }

    /// Make sure the files a GPT-2 checkpoint needs are cached and return
    /// the directory holding them.
    ///
    /// `config.json` is always required. The tokenizer comes from
    /// `tokenizer.json` or, failing that, `vocab.json` + `merges.txt`
    /// (+ optional `added_tokens.json`). Weights come from
    /// `model.safetensors` or, failing that, `pytorch_model.bin`.
    pub async fn snapshot(&self, repo: &str) -> Result<PathBuf> {
        validate_repo_id(repo)?;
        log::info!("Resolving {} ({}) into {}", repo, self.revision, self.cache_dir.display());

        self.fetch(repo, CONFIG_FILE, true).await?;

        if self.fetch(repo, TOKENIZER_FILE, false).await?.is_none() {
            self.fetch(repo, VOCAB_FILE, true).await?;
            self.fetch(repo, MERGES_FILE, true).await?;
            self.fetch(repo, ADDED_TOKENS_FILE, false).await?;
        }

        if self.fetch(repo, SAFETENSORS_FILE, false).await?.is_none() {
            self.fetch(repo, PYTORCH_FILE, true).await?;
        }

        Ok(self.repo_dir(repo))
    }

    /// Fetch one file of `repo` into the cache.
    ///
    /// Returns `Ok(None)` when an optional file does not exist upstream.
    pub async fn fetch(&self, repo: &str, file: &str, required: bool) -> Result<Option<PathBuf>> {
        let dir = self.repo_dir(repo);
        let local_path = dir.join(file);
        if local_path.exists() {
            log::debug!("Using cached {}", local_path.display());
            return Ok(Some(local_path));
        }

        let url = self.file_url(repo, file);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| InferError::Download(format!("Failed to fetch {}: {}", url, e)))?;
        let status = response.status();
        match status {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND if !required => {
                log::debug!("{} not present in {}", file, repo);
                return Ok(None);
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(InferError::Config(format!(
                    "access to {} was denied (HTTP {}); {}",
                    repo,
                    status.as_u16(),
                    if self.has_token() {
                        "the credential lacks permission"
                    } else {
                        "the repository may be gated and no credential was supplied"
                    }
                )));
            }
            _ => {
                return Err(InferError::Config(format!(
                    "Failed to download {} from {}: HTTP {}",
                    file,
                    repo,
                    status.as_u16()
                )));
            }
        }

        let bytes = response.bytes().await?;
        tokio::fs::create_dir_all(&dir).await?;
        // Only complete files reach `local_path`.
        let partial = dir.join(format!("{}.part", file));
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, &local_path).await?;

        log::info!("Downloaded {} ({} bytes)", local_path.display(), bytes.len());
        Ok(Some(local_path))
    }
}

/// Platform cache directory for downloaded models.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("spellgen")
}

fn validate_repo_id(repo: &str) -> Result<()> {
    let mut parts = repo.split('/');
    let valid = match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) => {
            !owner.is_empty() && !name.is_empty() && owner != ".." && name != ".."
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(InferError::Config(format!(
            "repository id must look like owner/name, got {:?}",
            repo
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_id_validation() {
        assert!(validate_repo_id("aegrif/gpt2_spell_gen").is_ok());
        assert!(validate_repo_id("gpt2").is_err());
        assert!(validate_repo_id("a/b/c").is_err());
        assert!(validate_repo_id("/b").is_err());
        assert!(validate_repo_id("../b").is_err());
    }

    #[test]
    fn test_empty_token_is_no_token() {
        let hub = Hub::new("/tmp/x").with_token(Some(String::new()));
        assert!(!hub.has_token());
        let hub = Hub::new("/tmp/x").with_token(Some("hf_abc".to_string()));
        assert!(hub.has_token());
    }
}
