//! Known models, their output limits and pricing.
//!
//! Remote model identifiers are matched exactly first, then by family
//! (`opus`, `sonnet`, `haiku`, version markers) so dated releases that are
//! not listed still get sensible limits and cost estimates.

use crate::backend::Usage;
use crate::config::BackendKind;

/// Output token budget for unknown remote models.
const DEFAULT_REMOTE_MAX_TOKENS: u32 = 4_000;

/// Output token budget for local models.
const LOCAL_MAX_TOKENS: u32 = 8_000;

const TOKENS_PER_PRICE_UNIT: f64 = 1_000_000.0;

/// Static facts about a remote model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelProfile {
    /// Model identifier
    pub id: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Output token budget requested per call
    pub max_output_tokens: u32,
    /// USD per million input tokens
    pub input_price: f64,
    /// USD per million output tokens
    pub output_price: f64,
}

impl ModelProfile {
    /// Estimated cost in USD for the given usage.
    #[must_use]
    pub fn cost(&self, usage: Usage) -> f64 {
        (usage.input_tokens as f64 * self.input_price
            + usage.output_tokens as f64 * self.output_price)
            / TOKENS_PER_PRICE_UNIT
    }
}

const OPUS_3: ModelProfile = ModelProfile {
    id: "claude-3-opus-20240229",
    description: "Claude 3 Opus - Highest quality, most expensive",
    max_output_tokens: 12_000,
    input_price: 15.0,
    output_price: 75.0,
};

const SONNET_3_7: ModelProfile = ModelProfile {
    id: "claude-3-7-sonnet-20250219",
    description: "Claude 3.7 Sonnet - Latest high performance model",
    max_output_tokens: 12_000,
    input_price: 5.0,
    output_price: 15.0,
};

const SONNET_3_5: ModelProfile = ModelProfile {
    id: "claude-3-5-sonnet-20240620",
    description: "Claude 3.5 Sonnet - Latest balanced model",
    max_output_tokens: 8_000,
    input_price: 3.0,
    output_price: 15.0,
};

const HAIKU_3_5: ModelProfile = ModelProfile {
    id: "claude-3-5-haiku-20240620",
    description: "Claude 3.5 Haiku - Latest affordable model",
    max_output_tokens: 4_000,
    input_price: 0.25,
    output_price: 1.25,
};

const SONNET_3: ModelProfile = ModelProfile {
    id: "claude-3-sonnet-20240229",
    description: "Claude 3 Sonnet - Good balance of quality and cost",
    max_output_tokens: 8_000,
    input_price: 3.0,
    output_price: 15.0,
};

const HAIKU_3: ModelProfile = ModelProfile {
    id: "claude-3-haiku-20240307",
    description: "Claude 3 Haiku - Fastest and most affordable",
    max_output_tokens: 4_000,
    input_price: 0.25,
    output_price: 1.25,
};

const CLAUDE_2_1: ModelProfile = ModelProfile {
    id: "claude-2.1",
    description: "Claude 2.1 - Older model, still reliable",
    max_output_tokens: 4_000,
    input_price: 0.8,
    output_price: 2.4,
};

const REMOTE_MODELS: &[ModelProfile] = &[
    SONNET_3_7, SONNET_3_5, HAIKU_3_5, OPUS_3, SONNET_3, HAIKU_3, CLAUDE_2_1,
];

const LOCAL_MODELS: &[(&str, &str)] = &[
    ("mistral", "Fast and efficient 7B Mistral model"),
    ("llama2", "Meta's LLama2 7B model"),
    ("llama3.1", "Meta's latest Llama 3.1, highly capable and efficient"),
    ("deepseek-r1", "DeepSeek R1 model with strong reasoning capabilities"),
    ("mistral-openorca", "Instruction-tuned Mistral, good for complex tasks"),
    ("zephyr", "Fast but high-quality 7B instruction model"),
];

/// Known remote models, newest first.
#[must_use]
pub const fn remote_models() -> &'static [ModelProfile] {
    REMOTE_MODELS
}

/// Suggested local models with descriptions.
#[must_use]
pub const fn local_models() -> &'static [(&'static str, &'static str)] {
    LOCAL_MODELS
}

/// Looks up a remote model by exact id, then by family.
#[must_use]
pub fn remote_profile(id: &str) -> Option<&'static ModelProfile> {
    if let Some(profile) = REMOTE_MODELS.iter().find(|p| p.id == id) {
        return Some(profile);
    }

    let family = if id.contains("3-7") && id.contains("sonnet") {
        &SONNET_3_7
    } else if id.contains("3-5") && id.contains("sonnet") {
        &SONNET_3_5
    } else if id.contains("3-5") && id.contains("haiku") {
        &HAIKU_3_5
    } else if id.contains("opus") {
        &OPUS_3
    } else if id.contains("sonnet") {
        &SONNET_3
    } else if id.contains("haiku") {
        &HAIKU_3
    } else if id.contains("2.1") {
        &CLAUDE_2_1
    } else {
        return None;
    };
    Some(family)
}

/// Description of a local model, ignoring any `:tag` suffix.
#[must_use]
pub fn local_description(name: &str) -> Option<&'static str> {
    let base = name.split(':').next().unwrap_or(name);
    LOCAL_MODELS
        .iter()
        .find(|(id, _)| *id == base)
        .map(|(_, description)| *description)
}

/// Output token budget to request for `model`.
#[must_use]
pub fn max_output_tokens(backend: BackendKind, model: &str) -> u32 {
    match backend {
        BackendKind::Remote => {
            remote_profile(model).map_or(DEFAULT_REMOTE_MAX_TOKENS, |p| p.max_output_tokens)
        }
        BackendKind::Local => LOCAL_MAX_TOKENS,
    }
}

/// Estimated cost in USD; unknown remote models are priced as the cheapest
/// tier and local models are free.
#[must_use]
pub fn estimate_cost(backend: BackendKind, model: &str, usage: Usage) -> f64 {
    match backend {
        BackendKind::Remote => remote_profile(model).unwrap_or(&HAIKU_3).cost(usage),
        BackendKind::Local => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_lookup() {
        let profile = remote_profile("claude-3-opus-20240229").unwrap();
        assert_eq!(profile.max_output_tokens, 12_000);
        assert!((profile.input_price - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_family_lookup() {
        assert_eq!(
            remote_profile("claude-3-7-sonnet-latest").unwrap().id,
            SONNET_3_7.id
        );
        assert_eq!(remote_profile("claude-3-5-haiku-latest").unwrap().id, HAIKU_3_5.id);
        assert_eq!(remote_profile("claude-3-opus-latest").unwrap().id, OPUS_3.id);
        assert_eq!(remote_profile("claude-sonnet-x").unwrap().id, SONNET_3.id);
        assert!(remote_profile("gpt-4").is_none());
    }

    #[test]
    fn test_max_output_tokens() {
        assert_eq!(max_output_tokens(BackendKind::Remote, "claude-3-haiku-20240307"), 4_000);
        assert_eq!(max_output_tokens(BackendKind::Remote, "claude-3-7-sonnet-20250219"), 12_000);
        assert_eq!(max_output_tokens(BackendKind::Remote, "mystery"), 4_000);
        assert_eq!(max_output_tokens(BackendKind::Local, "mistral"), 8_000);
    }

    #[test]
    fn test_cost_estimate() {
        let usage = Usage {
            input_tokens: 1_000_000,
            output_tokens: 1_000_000,
        };
        let opus = estimate_cost(BackendKind::Remote, "claude-3-opus-20240229", usage);
        assert!((opus - 90.0).abs() < 1e-9);

        let unknown = estimate_cost(BackendKind::Remote, "mystery", usage);
        assert!((unknown - 1.5).abs() < 1e-9);

        assert!(estimate_cost(BackendKind::Local, "mistral", usage).abs() < f64::EPSILON);
    }

    #[test]
    fn test_local_description_ignores_tag() {
        assert!(local_description("mistral:latest").is_some());
        assert!(local_description("llama3.1:8b").is_some());
        assert!(local_description("unknown:7b").is_none());
    }
}
