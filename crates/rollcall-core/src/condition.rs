//! Headcount evaluation

use rollcall_api::VerificationMode;

/// Result of evaluating one detected count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub passed: bool,
    pub effective_minimum: u32,
    pub note: String,
}

/// Smallest count that passes in the given mode.
///
/// Flexible mode accepts 90% of the threshold, truncated: 22 becomes 19.
pub fn effective_minimum(threshold: u32, mode: VerificationMode) -> u32 {
    match mode {
        VerificationMode::Exact => threshold,
        VerificationMode::Flexible => threshold * 9 / 10,
    }
}

/// Decides whether a detected count satisfies the headcount policy
pub struct ConditionEvaluator;

impl ConditionEvaluator {
    pub fn evaluate(detected: u32, threshold: u32, mode: VerificationMode) -> Evaluation {
        let minimum = effective_minimum(threshold, mode);

        let passed = match mode {
            VerificationMode::Exact => detected == threshold,
            VerificationMode::Flexible => detected >= minimum,
        };

        let note = match (passed, mode) {
            (true, _) => format!("detected {} of {}", detected, threshold),
            (false, VerificationMode::Exact) => {
                format!("detected {}, need exactly {}", detected, threshold)
            }
            (false, VerificationMode::Flexible) => format!(
                "detected {}, need at least {} of {}",
                detected, minimum, threshold
            ),
        };

        Evaluation {
            passed,
            effective_minimum: minimum,
            note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flexible_threshold_truncates() {
        // 21 students + instructor
        assert_eq!(effective_minimum(22, VerificationMode::Flexible), 19);
        assert_eq!(effective_minimum(2, VerificationMode::Flexible), 1);
        assert_eq!(effective_minimum(10, VerificationMode::Flexible), 9);
        assert_eq!(effective_minimum(101, VerificationMode::Flexible), 90);
    }

    #[test]
    fn flexible_mode() {
        let eval = ConditionEvaluator::evaluate(17, 22, VerificationMode::Flexible);
        assert!(!eval.passed);
        assert_eq!(eval.effective_minimum, 19);
        assert_eq!(eval.note, "detected 17, need at least 19 of 22");

        assert!(ConditionEvaluator::evaluate(19, 22, VerificationMode::Flexible).passed);
        assert!(ConditionEvaluator::evaluate(20, 22, VerificationMode::Flexible).passed);
        assert!(ConditionEvaluator::evaluate(30, 22, VerificationMode::Flexible).passed);
    }

    #[test]
    fn exact_mode() {
        assert!(ConditionEvaluator::evaluate(22, 22, VerificationMode::Exact).passed);
        assert!(!ConditionEvaluator::evaluate(21, 22, VerificationMode::Exact).passed);
        assert!(!ConditionEvaluator::evaluate(23, 22, VerificationMode::Exact).passed);

        let eval = ConditionEvaluator::evaluate(21, 22, VerificationMode::Exact);
        assert_eq!(eval.effective_minimum, 22);
    }
}
