pub mod error;
pub mod pipeline;
pub mod prompt;
pub mod settings;

pub use error::{Result, SpellError};
pub use pipeline::{Spell, SpellPipeline};
pub use prompt::Extraction;
pub use settings::Settings;

pub use spell_infer::{SamplingConfig, TextGenerator};
