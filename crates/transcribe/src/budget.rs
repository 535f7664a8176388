use serde::Deserialize;

/// A configured `max_length` at or below this is the generation-config
/// default some published checkpoints ship with, not a real limit.
pub const SUSPICIOUS_MAX_LENGTH: u32 = 20;

/// Positional limits reported for a loaded speech model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GenerationLimits {
    /// Decoder positional capacity.
    pub max_target_positions: u32,
    /// Tokens consumed by the forced decoder prompt (task, language, ...).
    #[serde(default)]
    pub prompt_tokens: u32,
    /// `max_length` from the model's generation config, if any.
    #[serde(default)]
    pub max_length: Option<u32>,
}

impl GenerationLimits {
    /// Room left for new tokens after the prompt and a one-token margin.
    pub fn capacity(&self) -> u32 {
        self.max_target_positions
            .saturating_sub(self.prompt_tokens)
            .saturating_sub(1)
            .max(1)
    }
}

/// Number of new tokens to request from the decoder.
///
/// A suspiciously small configured `max_length` is replaced by the positional
/// capacity; a sane one is kept but never allowed past capacity. `cap`
/// (from `WHISPER_MAX_NEW_TOKENS`) can only lower the result.
pub fn generation_budget(limits: &GenerationLimits, cap: Option<u32>) -> u32 {
    let capacity = limits.capacity();
    let budget = match limits.max_length {
        Some(configured) if configured > SUSPICIOUS_MAX_LENGTH => configured.min(capacity),
        _ => capacity,
    };

    match cap {
        Some(cap) if cap > 0 => budget.min(cap),
        _ => budget,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(max_length: Option<u32>) -> GenerationLimits {
        GenerationLimits {
            max_target_positions: 448,
            prompt_tokens: 4,
            max_length,
        }
    }

    #[test]
    fn suspicious_default_is_replaced_by_capacity() {
        assert_eq!(generation_budget(&limits(Some(20)), None), 443);
        assert_eq!(generation_budget(&limits(None), None), 443);
    }

    #[test]
    fn sane_config_is_kept_below_capacity() {
        assert_eq!(generation_budget(&limits(Some(225)), None), 225);
        assert_eq!(generation_budget(&limits(Some(10_000)), None), 443);
    }

    #[test]
    fn override_only_lowers() {
        assert_eq!(generation_budget(&limits(Some(20)), Some(128)), 128);
        assert_eq!(generation_budget(&limits(Some(20)), Some(4096)), 443);
        assert_eq!(generation_budget(&limits(Some(20)), Some(0)), 443);
    }

    #[test]
    fn capacity_never_drops_below_one() {
        let tight = GenerationLimits {
            max_target_positions: 3,
            prompt_tokens: 8,
            max_length: None,
        };
        assert_eq!(tight.capacity(), 1);
        assert_eq!(generation_budget(&tight, None), 1);
    }
}
