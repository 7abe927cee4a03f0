//! Property-based tests for build plan invariants.
//!
//! - Every dependency sits in an earlier level than its dependent
//! - Every target is planned exactly once
//! - Members of one level never depend on each other

use folio_core::{BuildPlan, Target};
use proptest::prelude::*;
use std::collections::HashMap;

// =============================================================================
// Strategies
// =============================================================================

/// A DAG of targets where each target only depends on earlier ones.
fn dag_strategy(max_targets: usize) -> impl Strategy<Value = Vec<Target>> {
    (1..=max_targets).prop_flat_map(|count| {
        let deps: Vec<_> = (0..count)
            .map(|i| {
                if i == 0 {
                    Just(Vec::new()).boxed()
                } else {
                    proptest::collection::vec(0..i, 0..=i.min(3)).boxed()
                }
            })
            .collect();
        deps.prop_map(|deps| {
            deps.into_iter()
                .enumerate()
                .map(|(i, mut deps)| {
                    deps.sort_unstable();
                    deps.dedup();
                    let names: Vec<String> = deps.iter().map(|d| format!("doc_{d}")).collect();
                    Target::new(format!("doc_{i}"), "Rmd")
                        .unwrap()
                        .with_dependencies(names)
                })
                .collect()
        })
    })
}

fn level_index(plan: &BuildPlan) -> HashMap<String, usize> {
    plan.levels()
        .iter()
        .enumerate()
        .flat_map(|(level, targets)| targets.iter().map(move |t| (t.name().to_string(), level)))
        .collect()
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn dependencies_precede_dependents(targets in dag_strategy(12)) {
        let plan = BuildPlan::new(targets.clone()).unwrap();
        let levels = level_index(&plan);

        for target in &targets {
            for dep in target.depends_on() {
                prop_assert!(levels[dep] < levels[target.name()]);
            }
        }
    }

    #[test]
    fn every_target_planned_once(targets in dag_strategy(12)) {
        let plan = BuildPlan::new(targets.clone()).unwrap();
        prop_assert_eq!(plan.len(), targets.len());
        prop_assert_eq!(level_index(&plan).len(), targets.len());
    }

    #[test]
    fn no_level_is_empty(targets in dag_strategy(12)) {
        let plan = BuildPlan::new(targets).unwrap();
        prop_assert!(plan.levels().iter().all(|level| !level.is_empty()));
    }

    #[test]
    fn closing_a_chain_into_a_loop_is_rejected(len in 2usize..8) {
        let targets: Vec<Target> = (0..len)
            .map(|i| {
                let dep = format!("doc_{}", (i + 1) % len);
                Target::new(format!("doc_{i}"), "Rmd").unwrap().with_dependencies(vec![dep])
            })
            .collect();
        prop_assert!(BuildPlan::new(targets).is_err());
    }
}
