use std::collections::HashSet;

use proptest::prelude::*;
use simrun_core::outcome::{self, ExecutionOutcome, OUTCOMES};

#[test]
fn outcome_codes_and_labels_unique_and_consistent() {
    let mut codes = HashSet::new();
    let mut labels = HashSet::new();

    for info in OUTCOMES {
        assert!(codes.insert(info.code), "duplicate outcome code {}", info.code);
        assert!(labels.insert(info.label), "duplicate outcome label {}", info.label);
        assert_eq!(
            outcome::classify(info.code),
            Ok(info.id),
            "outcome code not classifiable: {}",
            info.code
        );
        assert_eq!(info.id.label(), info.label, "label mismatch for {:?}", info.id);
    }
}

#[test]
fn outcome_labels_match_report_format() {
    let labels: Vec<&str> = OUTCOMES.iter().map(|i| i.label).collect();
    assert_eq!(labels, ["GoodTrap", "BadTrap", "Running", "Timeout", "Unknown"]);
}

#[test]
fn outcome_codes_are_contiguous_from_zero() {
    for (index, info) in OUTCOMES.iter().enumerate() {
        assert_eq!(info.code, index as i32, "registry out of order at {:?}", info.id);
    }
}

proptest! {
    #[test]
    fn classify_is_total_over_registry_and_rejects_the_rest(code in any::<i32>()) {
        match outcome::classify(code) {
            Ok(kind) => {
                prop_assert!((0..=4).contains(&code));
                prop_assert_eq!(kind.code(), code);
            }
            Err(err) => {
                prop_assert!(!(0..=4).contains(&code));
                prop_assert_eq!(err.0, code);
            }
        }
    }

    #[test]
    fn classify_is_idempotent(code in -8i32..16) {
        prop_assert_eq!(outcome::classify(code), outcome::classify(code));
    }

    #[test]
    fn pass_iff_code_zero(code in 0i32..=4) {
        let kind = outcome::classify(code).unwrap();
        prop_assert_eq!(kind.is_pass(), code == 0);
        prop_assert_eq!(kind == ExecutionOutcome::GoodTrap, code == 0);
    }
}
