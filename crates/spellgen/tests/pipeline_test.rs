use spell_infer::InferError;
use spellgen::{Extraction, SamplingConfig, Spell, SpellError, SpellPipeline, TextGenerator};
use std::sync::Mutex;

/// Echoes the prompt and appends a fixed continuation, recording calls.
struct Echo {
    continuation: String,
    calls: Mutex<Vec<(String, SamplingConfig)>>,
}

impl Echo {
    fn new(continuation: &str) -> Self {
        Self {
            continuation: continuation.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, SamplingConfig)> {
        self.calls.lock().unwrap().clone()
    }
}

impl TextGenerator for Echo {
    fn generate(&self, prompt: &str, config: &SamplingConfig) -> spell_infer::Result<String> {
        self.calls.lock().unwrap().push((prompt.to_string(), *config));
        Ok(format!("{}{}", prompt, self.continuation))
    }
}

/// Always fails the way an invalid decoding parameter does.
struct Broken;

impl TextGenerator for Broken {
    fn generate(&self, _prompt: &str, _config: &SamplingConfig) -> spell_infer::Result<String> {
        Err(InferError::Generation("top_k must be a non-negative integer".to_string()))
    }
}

fn config() -> SamplingConfig {
    SamplingConfig::new(0.9, 40, 0.95, 400)
}

#[test]
fn test_describe_dusty_tome() {
    let pipeline = SpellPipeline::new(Echo::new(""), Echo::new("A dusty tome opens."));
    let text = pipeline.describe("Moon Step", &config()).unwrap();
    assert_eq!(text, "Moon Step\n\nA dusty tome opens.");
}

#[test]
fn test_describe_builds_prompt_and_passes_config() {
    let description = Echo::new(" It glows.");
    let pipeline = SpellPipeline::new(Echo::new(""), &description);
    pipeline.describe("Shape Rock", &config()).unwrap();

    let calls = description.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "<|name|> Shape Rock <|spell|>");
    assert_eq!(calls[0].1, config());
}

#[test]
fn test_describe_starts_with_name_block() {
    let pipeline = SpellPipeline::new(Echo::new(""), Echo::new("\n  Sparks fly.  \n"));
    for name in ["Speak with Objects", "Summon Burley", "Bard's Laughter", "É"] {
        let text = pipeline.describe(name, &config()).unwrap();
        assert!(text.starts_with(&format!("{name}\n\n")), "{text:?}");
        assert_eq!(text.trim(), text);
    }
}

#[test]
fn test_describe_empty_name_does_not_fail() {
    let description = Echo::new(" Nothing happens.");
    let pipeline = SpellPipeline::new(Echo::new(""), &description);

    let text = pipeline.describe("", &config()).unwrap();
    assert_eq!(text, "Nothing happens.");
    assert_eq!(description.calls()[0].0, "<|name|>  <|spell|>");
}

#[test]
fn test_describe_propagates_generation_errors() {
    let pipeline = SpellPipeline::new(Echo::new(""), Broken);
    match pipeline.describe("Moon Step", &config()) {
        Err(SpellError::Infer(InferError::Generation(_))) => {}
        other => panic!("expected a generation error, got {other:?}"),
    }
}

#[test]
fn test_random_spell_chains_name_into_description() {
    let names = Echo::new(" Mundane Foresight \n");
    let descriptions = Echo::new(" You glimpse tomorrow.");
    let pipeline = SpellPipeline::new(&names, &descriptions);

    let spell = pipeline.random_spell(&config()).unwrap();
    assert_eq!(spell.name, "Mundane Foresight");
    assert_eq!(spell.description, "Mundane Foresight\n\nYou glimpse tomorrow.");
    assert!(spell.description.starts_with(&format!("{}\n\n", spell.name)));

    assert_eq!(
        descriptions.calls()[0].0,
        "<|name|> Mundane Foresight <|spell|>"
    );
}

#[test]
fn test_random_spell_caps_only_name_length() {
    let names = Echo::new("Word of Cancellation");
    let descriptions = Echo::new(" Magic unravels.");
    let pipeline = SpellPipeline::new(&names, &descriptions);

    pipeline.random_spell(&config()).unwrap();

    let name_calls = names.calls();
    assert_eq!(name_calls[0].0, "<|name|> ");
    assert_eq!(name_calls[0].1.max_length, 50);
    assert_eq!(name_calls[0].1.temperature, 0.9);
    assert_eq!(name_calls[0].1.top_k, 40);
    assert_eq!(name_calls[0].1.top_p, 0.95);

    assert_eq!(descriptions.calls()[0].1, config());
}

#[test]
fn test_random_spell_with_empty_name_continues() {
    let descriptions = Echo::new(" Something stirs.");
    let pipeline = SpellPipeline::new(Echo::new("   "), &descriptions);

    let spell = pipeline.random_spell(&config()).unwrap();
    assert_eq!(spell.name, "");
    assert_eq!(spell.description, "Something stirs.");
    assert_eq!(descriptions.calls()[0].0, "<|name|>  <|spell|>");
}

#[test]
fn test_random_spell_name_error_skips_description() {
    let descriptions = Echo::new(" unused");
    let pipeline = SpellPipeline::new(Broken, &descriptions);

    assert!(pipeline.random_spell(&config()).is_err());
    assert!(descriptions.calls().is_empty());
}

#[test]
fn test_spell_into_pair() {
    let spell = Spell {
        name: "Moon Step".to_string(),
        description: "Moon Step\n\nA path of light.".to_string(),
    };
    let (name, description): (String, String) = spell.into();
    assert_eq!(name, "Moon Step");
    assert_eq!(description, "Moon Step\n\nA path of light.");
}

#[test]
fn test_marker_extraction_is_selectable() {
    /// Drops the space after the name marker when echoing.
    struct Drifting;
    impl TextGenerator for Drifting {
        fn generate(&self, prompt: &str, _: &SamplingConfig) -> spell_infer::Result<String> {
            Ok(format!("{} A cold wind.", prompt.replacen("<|name|> ", "<|name|>  ", 1)))
        }
    }

    let pipeline = SpellPipeline::new(Echo::new(""), Drifting).with_extraction(Extraction::Marker);
    assert_eq!(pipeline.extraction(), Extraction::Marker);
    assert_eq!(
        pipeline.describe("Frost", &config()).unwrap(),
        "Frost\n\nA cold wind."
    );
}

#[test]
fn test_marker_random_spell_keeps_only_the_name() {
    let names = Echo::new("Fireball <|spell|> You hurl a ball of fire.");
    let descriptions = Echo::new(" Flames burst outward.");
    let pipeline = SpellPipeline::new(&names, &descriptions).with_extraction(Extraction::Marker);

    let spell = pipeline.random_spell(&config()).unwrap();
    assert_eq!(spell.name, "Fireball");
    assert_eq!(spell.description, "Fireball\n\nFlames burst outward.");
    assert_eq!(descriptions.calls()[0].0, "<|name|> Fireball <|spell|>");
}

#[test]
fn test_pipeline_is_shareable_across_threads() {
    let pipeline = std::sync::Arc::new(SpellPipeline::new(
        Echo::new("Gust"),
        Echo::new(" Wind howls."),
    ));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let pipeline = pipeline.clone();
            std::thread::spawn(move || {
                let config = SamplingConfig::new(0.5 + i as f64 * 0.1, i, 1.0, 100 + i as usize);
                pipeline.random_spell(&config).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().description, "Gust\n\nWind howls.");
    }
}
