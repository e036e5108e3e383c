//! Context-usage accounting.

/// Input tokens implied by a context-usage percentage.
///
/// `percentage` is on a 0–100 scale. The result is rounded to the nearest
/// token; negative or non-finite percentages yield 0.
pub fn input_tokens_from_context_usage(percentage: f64, context_window: u64) -> u64 {
    if !percentage.is_finite() || percentage <= 0.0 {
        return 0;
    }
    (percentage / 100.0 * context_window as f64).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_percentage() {
        assert_eq!(input_tokens_from_context_usage(10.0, 200_000), 20_000);
        assert_eq!(input_tokens_from_context_usage(0.5, 1000), 5);
    }

    #[test]
    fn rounds_to_nearest() {
        // 12.3456% of 1000 = 123.456
        assert_eq!(input_tokens_from_context_usage(12.3456, 1000), 123);
        // 12.37% of 1000 = 123.7
        assert_eq!(input_tokens_from_context_usage(12.37, 1000), 124);
    }

    #[test]
    fn degenerate_inputs() {
        assert_eq!(input_tokens_from_context_usage(-3.0, 1000), 0);
        assert_eq!(input_tokens_from_context_usage(f64::NAN, 1000), 0);
        assert_eq!(input_tokens_from_context_usage(50.0, 0), 0);
    }
}
