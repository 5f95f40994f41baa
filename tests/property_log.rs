//! Property-based tests for the operation log and applier
//!
//! Uses proptest to generate operation sequences and verify the revision
//! and replay invariants hold for all of them.

use cosync::backend::oplog::{ApplyOutcome, DocumentCore};
use cosync::shared::config::EngineConfig;
use cosync::shared::operation::EditOperation;
use proptest::prelude::*;
use uuid::Uuid;

/// A generated edit step against one of a few fields
#[derive(Debug, Clone)]
enum Step {
    Update(usize, String),
    Append(usize, String),
    Truncate(usize, usize),
}

fn field_name(idx: usize) -> String {
    format!("field{}", idx % 3)
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0usize..3, "[a-z]{0,8}").prop_map(|(f, v)| Step::Update(f, v)),
        (0usize..3, "[a-z]{1,5}").prop_map(|(f, v)| Step::Append(f, v)),
        (0usize..3, 1usize..4).prop_map(|(f, n)| Step::Truncate(f, n)),
    ]
}

/// Materialize a step into an operation valid for the current state
fn to_operation(core: &DocumentCore, user: Uuid, step: &Step) -> EditOperation {
    match step {
        Step::Update(f, value) => EditOperation::update(user, field_name(*f), value.clone(), None),
        Step::Append(f, text) => {
            let field = field_name(*f);
            let len = core.state().field_text(&field).chars().count();
            EditOperation::insert(user, field, len, text.clone())
        }
        Step::Truncate(f, n) => {
            let field = field_name(*f);
            let len = core.state().field_text(&field).chars().count();
            let take = (*n).min(len.max(1));
            if len == 0 {
                // Nothing to delete; fall back to an update.
                EditOperation::update(user, field, "reset", None)
            } else {
                EditOperation::delete(user, field, len - take, take)
            }
        }
    }
}

proptest! {
    /// Every accepted operation increments the revision by exactly one.
    #[test]
    fn revision_increments_by_one_per_accepted_operation(steps in prop::collection::vec(step_strategy(), 1..40)) {
        let config = EngineConfig::default();
        let user = Uuid::new_v4();
        let mut core = DocumentCore::new("quote", "Q-1");

        for step in &steps {
            let before = core.revision();
            let operation = to_operation(&core, user, step);
            let outcome = core.apply(operation, before, &config, None).unwrap();
            prop_assert_eq!(outcome, ApplyOutcome::Applied(before + 1));
            prop_assert_eq!(core.revision(), before + 1);
        }
        prop_assert_eq!(core.revision(), steps.len() as u64);
    }

    /// Replaying the full log from revision 0 reproduces the final content.
    #[test]
    fn log_replay_reproduces_final_state(steps in prop::collection::vec(step_strategy(), 1..40)) {
        let config = EngineConfig::default();
        let user = Uuid::new_v4();
        let mut core = DocumentCore::new("quote", "Q-1");
        for step in &steps {
            let based_on = core.revision();
            let operation = to_operation(&core, user, step);
            core.apply(operation, based_on, &config, None).unwrap();
        }

        let replayed = core.replay();
        prop_assert_eq!(&replayed.content, &core.state().content);
        prop_assert_eq!(replayed.revision, core.revision());
    }

    /// Submitting the same operation twice never double-applies.
    #[test]
    fn duplicate_submission_is_idempotent(steps in prop::collection::vec(step_strategy(), 1..20)) {
        let config = EngineConfig::default();
        let user = Uuid::new_v4();
        let mut core = DocumentCore::new("quote", "Q-1");

        for step in &steps {
            let based_on = core.revision();
            let operation = to_operation(&core, user, step);
            let first = core.apply(operation.clone(), based_on, &config, None).unwrap();
            let content_after = core.state().content.clone();

            let second = core.apply(operation, core.revision(), &config, None).unwrap();
            prop_assert_eq!(second, ApplyOutcome::Duplicate(first.revision()));
            prop_assert_eq!(&core.state().content, &content_after);
            prop_assert_eq!(core.revision(), first.revision());
        }
    }
}
