//! Property tests: every batch releases its barrier exactly once per task and
//! aggregates every payload, whatever mix of outcomes it contains.

mod common;

use std::collections::HashMap;

use latchpool::{task_fn, BatchExecutor, ExecutorConfig, ResultRecord, Task};
use proptest::prelude::*;

use common::ScriptedPool;

#[derive(Debug, Clone)]
enum Outcome {
    Success(u32),
    Error(u32),
    Both(u32, u32),
    Nothing,
    Panic,
}

fn outcome_strategy() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        any::<u32>().prop_map(Outcome::Success),
        any::<u32>().prop_map(Outcome::Error),
        (any::<u32>(), any::<u32>()).prop_map(|(s, e)| Outcome::Both(s, e)),
        Just(Outcome::Nothing),
        Just(Outcome::Panic),
    ]
}

fn batch_strategy() -> impl Strategy<Value = Vec<(Outcome, bool)>> {
    prop::collection::vec((outcome_strategy(), prop::bool::weighted(0.2)), 1..24)
}

fn build_task(index: usize, outcome: Outcome) -> Box<dyn Task<u32, u32>> {
    task_fn(format!("task-{index}"), move || match outcome {
        Outcome::Success(s) => ResultRecord::success(s),
        Outcome::Error(e) => ResultRecord::failure(e),
        Outcome::Both(s, e) => ResultRecord::partial(s, e),
        Outcome::Nothing => ResultRecord::empty(),
        Outcome::Panic => panic!("scripted panic in task {index}"),
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_barrier_conservation_and_aggregation(
        batch in batch_strategy(),
        workers in 1usize..5,
    ) {
        let refusals: HashMap<usize, String> = batch
            .iter()
            .enumerate()
            .filter(|(_, (_, refused))| *refused)
            .map(|(index, _)| (index, format!("refused-{index}")))
            .collect();

        let mut expected_successes = Vec::new();
        let mut expected_errors = Vec::new();
        let mut expected_panics = 0;
        for (index, (outcome, _)) in batch.iter().enumerate() {
            if refusals.contains_key(&index) {
                continue;
            }
            match outcome {
                Outcome::Success(s) => expected_successes.push(*s),
                Outcome::Error(e) => expected_errors.push(*e),
                Outcome::Both(s, e) => {
                    expected_successes.push(*s);
                    expected_errors.push(*e);
                }
                Outcome::Nothing => {}
                Outcome::Panic => expected_panics += 1,
            }
        }

        let pool = ScriptedPool::new(workers, refusals.clone());
        let mut executor: BatchExecutor<u32, u32> =
            BatchExecutor::with_pool(pool, ExecutorConfig::new(workers));
        let tasks: Vec<_> = batch
            .into_iter()
            .enumerate()
            .map(|(index, (outcome, _))| build_task(index, outcome))
            .collect();
        let total = tasks.len();

        let report = executor.execute(tasks).expect("batch must always complete");

        let barrier = executor.barrier().expect("barrier initialized");
        prop_assert_eq!(barrier.count(), 0);
        prop_assert_eq!(barrier.releases(), total);

        let mut successes = executor.success_results();
        successes.sort_unstable();
        expected_successes.sort_unstable();
        prop_assert_eq!(successes, expected_successes);

        let mut errors = executor.reported_errors();
        errors.sort_unstable();
        expected_errors.sort_unstable();
        prop_assert_eq!(errors, expected_errors);

        prop_assert_eq!(report.panics, expected_panics);
        prop_assert_eq!(report.rejected, refusals.len());

        let rejections = executor.submission_errors();
        prop_assert_eq!(rejections.len(), refusals.len());
        for (id, reason) in rejections {
            prop_assert_eq!(reason.to_string(), refusals[&id.index].clone());
            prop_assert_eq!(id.name, format!("task-{}", id.index));
        }
    }
}
