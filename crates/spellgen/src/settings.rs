use crate::{Extraction, Result, SpellError};
use spell_infer::hub::{default_cache_dir, Hub, DEFAULT_REVISION};
use std::fmt;
use std::path::PathBuf;

pub const TOKEN_ENV: &str = "HF_API";
pub const NAME_MODEL_ENV: &str = "SPELLGEN_NAME_MODEL";
pub const SPELL_MODEL_ENV: &str = "SPELLGEN_SPELL_MODEL";
pub const REVISION_ENV: &str = "SPELLGEN_REVISION";
pub const CACHE_DIR_ENV: &str = "SPELLGEN_CACHE_DIR";
pub const EXTRACTION_ENV: &str = "SPELLGEN_EXTRACTION";
pub const CUDA_ENV: &str = "SPELLGEN_CUDA";

pub const DEFAULT_MODEL: &str = "aegrif/gpt2_spell_gen";

/// Process-wide settings, read once at startup.
#[derive(Clone, PartialEq)]
pub struct Settings {
    /// Credential for gated model repositories.
    pub hf_token: Option<String>,
    pub name_model: String,
    pub spell_model: String,
    pub revision: String,
    pub cache_dir: PathBuf,
    pub extraction: Extraction,
    /// CUDA ordinal to run on; CPU when unset.
    pub cuda_device: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hf_token: None,
            name_model: DEFAULT_MODEL.to_string(),
            spell_model: DEFAULT_MODEL.to_string(),
            revision: DEFAULT_REVISION.to_string(),
            cache_dir: default_cache_dir(),
            extraction: Extraction::default(),
            cuda_device: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Settings::default();

        let extraction = match get(EXTRACTION_ENV) {
            Some(value) => value.parse()?,
            None => defaults.extraction,
        };
        let cuda_device = match get(CUDA_ENV) {
            Some(value) => Some(value.parse::<usize>().map_err(|_| {
                SpellError::Settings(format!("{} must be a device ordinal, got {:?}", CUDA_ENV, value))
            })?),
            None => None,
        };

        Ok(Self {
            hf_token: get(TOKEN_ENV),
            name_model: get(NAME_MODEL_ENV).unwrap_or(defaults.name_model),
            spell_model: get(SPELL_MODEL_ENV).unwrap_or(defaults.spell_model),
            revision: get(REVISION_ENV).unwrap_or(defaults.revision),
            cache_dir: get(CACHE_DIR_ENV).map(PathBuf::from).unwrap_or(defaults.cache_dir),
            extraction,
            cuda_device,
        })
    }

    pub fn hub(&self) -> Hub {
        Hub::new(&self.cache_dir)
            .with_revision(&self.revision)
            .with_token(self.hf_token.clone())
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("hf_token", &self.hf_token.as_ref().map(|_| "<redacted>"))
            .field("name_model", &self.name_model)
            .field("spell_model", &self.spell_model)
            .field("revision", &self.revision)
            .field("cache_dir", &self.cache_dir)
            .field("extraction", &self.extraction)
            .field("cuda_device", &self.cuda_device)
            .finish()
    }
}
