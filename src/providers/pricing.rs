use serde::{Deserialize, Serialize};

/// USD per million tokens for one model. Immutable, process-wide, read-only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingRate {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

/// Applied when a model is not listed in the rate table
pub const DEFAULT_RATE: PricingRate = PricingRate {
    input_per_million: 1.00,
    output_per_million: 5.00,
};

/// Static per-model rates
const MODEL_RATES: &[(&str, PricingRate)] = &[
    (
        "claude-haiku-4-5",
        PricingRate {
            input_per_million: 1.00,
            output_per_million: 5.00,
        },
    ),
    (
        "claude-sonnet-4-5",
        PricingRate {
            input_per_million: 3.00,
            output_per_million: 15.00,
        },
    ),
    (
        "gpt-5-mini",
        PricingRate {
            input_per_million: 0.25,
            output_per_million: 2.00,
        },
    ),
    (
        "gpt-5-nano",
        PricingRate {
            input_per_million: 0.05,
            output_per_million: 0.40,
        },
    ),
    (
        "gemini-3-flash-preview",
        PricingRate {
            input_per_million: 0.50,
            output_per_million: 3.00,
        },
    ),
];

pub fn rate_for_model(model: &str) -> PricingRate {
    MODEL_RATES
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, rate)| *rate)
        .unwrap_or(DEFAULT_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model_rate() {
        let rate = rate_for_model("gpt-5-mini");
        assert_eq!(rate.input_per_million, 0.25);
        assert_eq!(rate.output_per_million, 2.00);
    }

    #[test]
    fn test_unknown_model_falls_back_to_default() {
        assert_eq!(rate_for_model("some-future-model"), DEFAULT_RATE);
    }
}
