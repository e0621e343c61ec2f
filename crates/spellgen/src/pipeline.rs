use crate::prompt::{self, Extraction, NAME_MAX_LENGTH, NAME_SEED_PROMPT};
use crate::{Result, Settings};
use spell_infer::{Gpt2, Inference, SamplingConfig, TextGenerator};

/// A generated spell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spell {
    pub name: String,
    /// The full block shown to the user: name, blank line, description.
    pub description: String,
}

impl From<Spell> for (String, String) {
    fn from(spell: Spell) -> Self {
        (spell.name, spell.description)
    }
}

/// Chains a name model and a description model.
///
/// Each call takes its own `SamplingConfig`; the pipeline holds no
/// per-request state and can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct SpellPipeline<N, D> {
    name_generator: N,
    description_generator: D,
    extraction: Extraction,
}

impl<N: TextGenerator, D: TextGenerator> SpellPipeline<N, D> {
    pub fn new(name_generator: N, description_generator: D) -> Self {
        Self {
            name_generator,
            description_generator,
            extraction: Extraction::default(),
        }
    }

    pub fn with_extraction(mut self, extraction: Extraction) -> Self {
        self.extraction = extraction;
        self
    }

    pub fn extraction(&self) -> Extraction {
        self.extraction
    }

    /// Describe a spell called `name`.
    ///
    /// Returns `"{name}\n\n{description}"`, trimmed. Any name is accepted,
    /// including the empty string.
    pub fn describe(&self, name: &str, config: &SamplingConfig) -> Result<String> {
        let prompt = prompt::description_prompt(name);
        let raw = self.description_generator.generate(&prompt, config)?;
        let description = self.extraction.description(&raw, name);
        log::debug!("Described {:?} with {} chars", name, description.chars().count());
        Ok(prompt::assemble(name, description))
    }

    /// Ask the name model for a fresh spell name, trimmed.
    ///
    /// Only `max_length` is capped for this call; the other knobs pass
    /// through unchanged.
    pub fn random_name(&self, config: &SamplingConfig) -> Result<String> {
        let name_config = config.capped(NAME_MAX_LENGTH);
        let raw = self.name_generator.generate(NAME_SEED_PROMPT, &name_config)?;
        Ok(self.extraction.name(&raw).trim().to_string())
    }

    /// Generate a name, then describe it with the caller's config.
    ///
    /// An empty generated name is passed on as is.
    pub fn random_spell(&self, config: &SamplingConfig) -> Result<Spell> {
        let name = self.random_name(config)?;
        if name.is_empty() {
            log::warn!("Name model produced an empty name; describing it anyway");
        }
        let description = self.describe(&name, config)?;
        Ok(Spell { name, description })
    }
}

impl SpellPipeline<Gpt2, Gpt2> {
    /// Fetch and load both models named in `settings`.
    ///
    /// When both settings point at the same repository the loaded model is
    /// shared instead of loaded twice.
    pub async fn from_settings(settings: &Settings, inference: &Inference) -> Result<Self> {
        let hub = settings.hub();
        let description_generator = inference
            .use_gpt2_from_hub(&hub, &settings.spell_model)
            .await?;
        let name_generator = if settings.name_model == settings.spell_model {
            description_generator.clone()
        } else {
            inference.use_gpt2_from_hub(&hub, &settings.name_model).await?
        };
        Ok(Self::new(name_generator, description_generator).with_extraction(settings.extraction))
    }
}
