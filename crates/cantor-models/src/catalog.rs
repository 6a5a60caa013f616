//! Catalog of supported speech models.
//!
//! A model is addressed by a [`ModelKey`]: a family plus a size/variant tag.
//! The catalog also carries the fixed speaker, language and tag lists the
//! request handlers validate against.

use cantor_abstraction::{LoadOptions, LoadTarget};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Built-in speakers of the CustomVoice family.
pub const SPEAKERS: &[&str] =
    &["Aiden", "Dylan", "Eric", "Ono_anna", "Ryan", "Serena", "Sohee", "Uncle_fu", "Vivian"];

/// Languages accepted by the Qwen families. "Auto" lets the model detect it.
pub const LANGUAGES: &[&str] = &[
    "Auto",
    "Chinese",
    "English",
    "Japanese",
    "Korean",
    "French",
    "German",
    "Spanish",
    "Portuguese",
    "Russian",
];

/// Language ids accepted by the Multilingual family.
pub const MULTILINGUAL_LANGUAGE_IDS: &[&str] = &[
    "ar", "da", "de", "el", "en", "es", "fi", "fr", "he", "hi", "it", "ja", "ko", "ms", "nl", "no",
    "pl", "pt", "ru", "sv", "sw", "tr", "zh",
];

/// Paralinguistic tags understood by the Turbo family when embedded in text.
pub const PARALINGUISTIC_TAGS: &[&str] = &[
    "[clear throat]",
    "[sigh]",
    "[shush]",
    "[cough]",
    "[groan]",
    "[sniff]",
    "[gasp]",
    "[chuckle]",
    "[laugh]",
];

/// Errors raised while building or parsing a model key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// The family name is not recognized.
    #[error("Unknown model family: {0}")]
    UnknownFamily(String),

    /// The variant is not offered for this family.
    #[error("Model family {family} has no variant '{variant}' (available: {available})")]
    UnknownVariant {
        /// The family.
        family: ModelFamily,
        /// The rejected variant.
        variant: String,
        /// Comma separated list of valid variants.
        available: String,
    },

    /// The key string is not of the form `Family_Variant`.
    #[error("Malformed model key '{0}', expected Family_Variant")]
    MalformedKey(String),
}

/// Model family enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelFamily {
    /// Fixed built-in speakers with optional style instruction.
    CustomVoice,
    /// Voice synthesized from a free-form description.
    VoiceDesign,
    /// Base model used for voice cloning from reference audio.
    Base,
    /// Fast English model with paralinguistic tags.
    Turbo,
    /// Standard English model with exaggeration control.
    Standard,
    /// Multilingual model (23 languages).
    Multilingual,
}

impl ModelFamily {
    /// Every family, in catalog order.
    pub const ALL: [Self; 6] = [
        Self::CustomVoice,
        Self::VoiceDesign,
        Self::Base,
        Self::Turbo,
        Self::Standard,
        Self::Multilingual,
    ];

    /// Canonical family name, as used in keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CustomVoice => "CustomVoice",
            Self::VoiceDesign => "VoiceDesign",
            Self::Base => "Base",
            Self::Turbo => "Turbo",
            Self::Standard => "Standard",
            Self::Multilingual => "Multilingual",
        }
    }

    /// Variants offered for this family.
    #[must_use]
    pub const fn variants(self) -> &'static [&'static str] {
        match self {
            Self::CustomVoice | Self::Base => &["0.6B", "1.7B"],
            Self::VoiceDesign => &["1.7B"],
            Self::Turbo => &["350M"],
            Self::Standard | Self::Multilingual => &["500M"],
        }
    }

    /// The variant used when none is requested.
    #[must_use]
    pub const fn default_variant(self) -> &'static str {
        self.variants()[0]
    }

    /// Human readable description for listings.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::CustomVoice => "Predefined speakers with optional style instruction",
            Self::VoiceDesign => "Voice designed from a text description",
            Self::Base => "Voice cloning from reference audio",
            Self::Turbo => "Fast English with paralinguistic tags",
            Self::Standard => "English with emotional exaggeration, used for narration",
            Self::Multilingual => "23 languages with exaggeration control",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "").as_str() {
            "customvoice" | "custom" | "speaker" => Ok(Self::CustomVoice),
            "voicedesign" | "design" => Ok(Self::VoiceDesign),
            "base" | "clone" | "voiceclone" => Ok(Self::Base),
            "turbo" => Ok(Self::Turbo),
            "standard" | "narrator" => Ok(Self::Standard),
            "multilingual" | "multi" => Ok(Self::Multilingual),
            _ => Err(CatalogError::UnknownFamily(s.to_string())),
        }
    }
}

/// Identifier of one loadable model.
///
/// Keys are validated on construction, so every `ModelKey` names a model the
/// catalog offers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelKey {
    family: ModelFamily,
    variant: String,
}

impl ModelKey {
    /// Create a key, rejecting variants the family does not offer.
    ///
    /// Variant matching is case-insensitive ("0.6b" is accepted).
    pub fn new(family: ModelFamily, variant: &str) -> Result<Self, CatalogError> {
        let canonical = family
            .variants()
            .iter()
            .find(|v| v.eq_ignore_ascii_case(variant.trim()))
            .ok_or_else(|| CatalogError::UnknownVariant {
                family,
                variant: variant.to_string(),
                available: family.variants().join(", "),
            })?;
        Ok(Self { family, variant: (*canonical).to_string() })
    }

    /// Key for the family's default variant.
    #[must_use]
    pub fn default_for(family: ModelFamily) -> Self {
        Self { family, variant: family.default_variant().to_string() }
    }

    /// The model family.
    #[must_use]
    pub const fn family(&self) -> ModelFamily {
        self.family
    }

    /// The size/variant tag.
    #[must_use]
    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Upstream repository holding the weights.
    #[must_use]
    pub fn repo_id(&self) -> String {
        match self.family {
            ModelFamily::CustomVoice | ModelFamily::VoiceDesign | ModelFamily::Base => {
                format!("Qwen/Qwen3-TTS-12Hz-{}-{}", self.variant, self.family)
            }
            ModelFamily::Turbo => "ResembleAI/chatterbox-turbo".to_string(),
            ModelFamily::Standard | ModelFamily::Multilingual => "ResembleAI/chatterbox".to_string(),
        }
    }

    /// Build the loader request for this key.
    #[must_use]
    pub fn load_target(&self, options: LoadOptions) -> LoadTarget {
        LoadTarget { model_id: self.to_string(), repo_id: self.repo_id(), options, weights_dir: None }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.family, self.variant)
    }
}

impl FromStr for ModelKey {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (family, variant) =
            s.split_once('_').ok_or_else(|| CatalogError::MalformedKey(s.to_string()))?;
        Self::new(family.parse()?, variant)
    }
}

impl TryFrom<String> for ModelKey {
    type Error = CatalogError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelKey> for String {
    fn from(key: ModelKey) -> Self {
        key.to_string()
    }
}

/// Normalize a speaker name the way the CustomVoice family expects it.
///
/// "Uncle Fu" becomes "uncle_fu".
#[must_use]
pub fn normalize_speaker(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Look up a built-in speaker, ignoring case and space/underscore differences.
#[must_use]
pub fn find_speaker(name: &str) -> Option<&'static str> {
    let wanted = normalize_speaker(name);
    SPEAKERS.iter().copied().find(|s| normalize_speaker(s) == wanted)
}

/// Look up a language name, ignoring case.
#[must_use]
pub fn find_language(name: &str) -> Option<&'static str> {
    LANGUAGES.iter().copied().find(|l| l.eq_ignore_ascii_case(name.trim()))
}

/// Returns `true` if `id` is a Multilingual language id.
#[must_use]
pub fn is_multilingual_language(id: &str) -> bool {
    MULTILINGUAL_LANGUAGE_IDS.contains(&id.trim().to_lowercase().as_str())
}
