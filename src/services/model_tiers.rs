//! The adapter's ordered model-capability set (spec §4.7, "model → a
//! higher/lower-capability model from the adapter's ordered set").
//!
//! The LLM SDK itself is out of scope (spec §1); this list only needs to be
//! internally ordered cheapest-to-most-capable so the evolution analyzer's
//! cost-up/cost-down mutation has something concrete to step through.

/// Ascending by capability (and cost). Index 0 is the cheapest.
pub const MODEL_TIERS: &[&str] = &["research-lite", "research-standard", "research-pro", "research-frontier"];

pub fn default_model() -> &'static str {
    MODEL_TIERS[1]
}

fn tier_index(model: &str) -> Option<usize> {
    MODEL_TIERS.iter().position(|m| *m == model)
}

/// One step up in capability. A model outside the known set, or already at
/// the top, is left unchanged.
pub fn next_higher(model: &str) -> String {
    match tier_index(model) {
        Some(i) if i + 1 < MODEL_TIERS.len() => MODEL_TIERS[i + 1].to_string(),
        _ => model.to_string(),
    }
}

/// One step down in capability (cost-down). A model outside the known set,
/// or already at the bottom, is left unchanged.
pub fn next_lower(model: &str) -> String {
    match tier_index(model) {
        Some(i) if i > 0 => MODEL_TIERS[i - 1].to_string(),
        _ => model.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_up_and_down_within_bounds() {
        assert_eq!(next_higher("research-lite"), "research-standard");
        assert_eq!(next_higher("research-frontier"), "research-frontier");
        assert_eq!(next_lower("research-lite"), "research-lite");
        assert_eq!(next_lower("research-pro"), "research-standard");
    }

    #[test]
    fn unknown_model_is_left_unchanged() {
        assert_eq!(next_higher("custom-model"), "custom-model");
        assert_eq!(next_lower("custom-model"), "custom-model");
    }
}
