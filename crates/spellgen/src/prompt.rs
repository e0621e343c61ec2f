//! Prompt scaffolding for the spell models and recovery of the generated
//! text from their raw output.
//!
//! The markers are the delimiters the models were fine-tuned on. Raw model
//! output echoes the prompt, so the generated part is whatever follows it.

use crate::SpellError;
use std::str::FromStr;

pub const NAME_MARKER: &str = "<|name|>";
pub const SPELL_MARKER: &str = "<|spell|>";

/// Seed prompt for the name model.
pub const NAME_SEED_PROMPT: &str = "<|name|> ";

/// Characters of `NAME_SEED_PROMPT`.
pub const NAME_OFFSET: usize = 9;

/// Characters the description template adds around the name.
pub const DESCRIPTION_TEMPLATE_LEN: usize = 19;

/// Token budget for a generated name, whatever the caller asked for.
pub const NAME_MAX_LENGTH: usize = 50;

/// `"<|name|> {name} <|spell|>"`
pub fn description_prompt(name: &str) -> String {
    format!("{} {} {}", NAME_MARKER, name, SPELL_MARKER)
}

/// Character offset where the description starts in raw output for `name`.
pub fn description_offset(name: &str) -> usize {
    name.chars().count() + DESCRIPTION_TEMPLATE_LEN
}

/// `s` from the `offset`-th character on; empty when `s` is shorter.
pub fn tail_from_char(s: &str, offset: usize) -> &str {
    match s.char_indices().nth(offset) {
        Some((byte, _)) => &s[byte..],
        None => "",
    }
}

/// The user-facing block: name, blank line, description, trimmed.
pub fn assemble(name: &str, description: &str) -> String {
    format!("{}\n\n{}", name, description).trim().to_string()
}

/// `tail` up to the first spell marker or line break.
fn cut_name(tail: &str) -> &str {
    let end = [tail.find(SPELL_MARKER), tail.find('\n')]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(tail.len());
    &tail[..end]
}

/// How the generated part is cut out of raw model output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Extraction {
    /// Fixed character offsets derived from the prompt templates.
    #[default]
    FixedOffset,
    /// Slice after the marker found in the output; fixed offsets when the
    /// marker is missing.
    Marker,
}

impl Extraction {
    /// Generated description in `raw`, untrimmed.
    pub fn description<'a>(&self, raw: &'a str, name: &str) -> &'a str {
        let prompt = description_prompt(name);
        if !raw.starts_with(&prompt) {
            log::warn!(
                "Description output does not echo its prompt; extracted text may be shifted"
            );
        }
        match self {
            Extraction::FixedOffset => tail_from_char(raw, description_offset(name)),
            Extraction::Marker => {
                if let Some(rest) = raw.strip_prefix(&prompt) {
                    return rest;
                }
                match raw.find(SPELL_MARKER) {
                    Some(at) => &raw[at + SPELL_MARKER.len()..],
                    None => {
                        log::debug!("No {} marker in output, using the fixed offset", SPELL_MARKER);
                        tail_from_char(raw, description_offset(name))
                    }
                }
            }
        }
    }

    /// Generated name in `raw`, untrimmed.
    ///
    /// `FixedOffset` keeps everything after the seed prompt. `Marker` also
    /// ends the name where the model starts a spell body or a new line.
    pub fn name<'a>(&self, raw: &'a str) -> &'a str {
        if !raw.starts_with(NAME_SEED_PROMPT) {
            log::warn!("Name output does not echo its prompt; extracted text may be shifted");
        }
        match self {
            Extraction::FixedOffset => tail_from_char(raw, NAME_OFFSET),
            Extraction::Marker => {
                let tail = match raw.find(NAME_MARKER) {
                    Some(at) => &raw[at + NAME_MARKER.len()..],
                    None => {
                        log::debug!("No {} marker in output, using the fixed offset", NAME_MARKER);
                        tail_from_char(raw, NAME_OFFSET)
                    }
                };
                cut_name(tail)
            }
        }
    }
}

impl FromStr for Extraction {
    type Err = SpellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offset" | "fixed" | "fixed-offset" => Ok(Extraction::FixedOffset),
            "marker" => Ok(Extraction::Marker),
            other => Err(SpellError::Settings(format!(
                "unknown extraction strategy {:?} (expected \"offset\" or \"marker\")",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_lengths_match_constants() {
        assert_eq!(NAME_SEED_PROMPT.chars().count(), NAME_OFFSET);
        assert_eq!(description_prompt("").chars().count(), DESCRIPTION_TEMPLATE_LEN);
        assert_eq!(description_prompt("Moon Step").chars().count(), description_offset("Moon Step"));
    }

    #[test]
    fn test_description_offset_for_various_names() {
        for name in ["", "X", "Burden of the Godsss"] {
            assert_eq!(description_offset(name), name.chars().count() + 19);
            let raw = format!("<|name|> {} <|spell|> REST", name);
            for extraction in [Extraction::FixedOffset, Extraction::Marker] {
                assert_eq!(extraction.description(&raw, name).trim(), "REST");
            }
        }
    }

    #[test]
    fn test_name_offset_extraction() {
        for extraction in [Extraction::FixedOffset, Extraction::Marker] {
            assert_eq!(extraction.name("<|name|> REST").trim(), "REST");
        }
    }

    #[test]
    fn test_marker_name_stops_at_spell_body() {
        let raw = "<|name|> Fireball <|spell|> You hurl a ball of fire.";
        assert_eq!(Extraction::Marker.name(raw).trim(), "Fireball");
        assert_eq!(Extraction::Marker.name("<|name|> Gust\nA breeze.").trim(), "Gust");
        assert_eq!(Extraction::Marker.name("<|name|> <|spell|> text").trim(), "");
        // Offset extraction keeps the whole continuation.
        assert_eq!(
            Extraction::FixedOffset.name(raw).trim(),
            "Fireball <|spell|> You hurl a ball of fire."
        );
    }

    #[test]
    fn test_offsets_count_characters_not_bytes() {
        let name = "Éclair de Lune";
        let raw = format!("<|name|> {} <|spell|> Un éclair.", name);
        assert_eq!(Extraction::FixedOffset.description(&raw, name).trim(), "Un éclair.");
    }

    #[test]
    fn test_short_output_degrades_to_empty() {
        assert_eq!(Extraction::FixedOffset.description("<|name|>", "Moon Step"), "");
        assert_eq!(Extraction::FixedOffset.name("<|na"), "");
        assert_eq!(tail_from_char("", 3), "");
    }

    #[test]
    fn test_marker_survives_whitespace_drift() {
        // Tokenizer normalisation doubled the space after the name marker.
        let raw = "<|name|>  Moon Step <|spell|> A silver path.";
        assert_eq!(
            Extraction::Marker.description(raw, "Moon Step").trim(),
            "A silver path."
        );
        // The fixed offset lands inside the marker.
        assert_eq!(
            Extraction::FixedOffset.description(raw, "Moon Step").trim(),
            "> A silver path."
        );
    }

    #[test]
    fn test_marker_falls_back_to_offset() {
        let raw = "<|name|> Moon Step <|spel| A path.";
        assert_eq!(
            Extraction::Marker.description(raw, "Moon Step"),
            Extraction::FixedOffset.description(raw, "Moon Step")
        );
    }

    #[test]
    fn test_assemble_trims_and_is_idempotent() {
        let block = assemble("Moon Step", " A dusty tome opens.\n");
        assert_eq!(block, "Moon Step\n\nA dusty tome opens.");
        assert_eq!(block.trim(), block);
        assert_eq!(assemble("", " text "), "text");
    }

    #[test]
    fn test_extraction_from_str() {
        assert_eq!("offset".parse::<Extraction>().unwrap(), Extraction::FixedOffset);
        assert_eq!(" MARKER ".parse::<Extraction>().unwrap(), Extraction::Marker);
        assert!("regex".parse::<Extraction>().is_err());
    }
}
