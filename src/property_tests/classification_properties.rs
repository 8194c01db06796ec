// Every listed key lands in exactly one state set, folder markers only ever
// in SkippedFolder, and no descriptor text makes classification fail.

#[cfg(test)]
mod tests {
    use crate::classifier::classify;
    use crate::summary::{PageSummary, RestoreTotals};
    use crate::test_utils::{FINISHED, ONGOING};
    use crate::types::{RestoreState, is_folder_marker};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn arb_key() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z]{1,6}(/[a-z0-9]{1,6}){0,3}",
            "[a-z]{1,6}(/[a-z0-9]{1,6}){0,3}/",
        ]
    }

    fn arb_descriptor() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some(ONGOING.to_string())),
            Just(Some(FINISHED.to_string())),
            ".{0,40}".prop_map(Some),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn page_partition_is_exhaustive_and_disjoint(
            entries in prop::collection::vec((arb_key(), arb_descriptor()), 0..60),
        ) {
            let mut page = PageSummary::new(0, 0);
            for (key, descriptor) in &entries {
                page.record(key, classify(key, descriptor.as_deref(), false));
            }

            let distinct: BTreeSet<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
            prop_assert_eq!(page.len(), distinct.len());
            prop_assert_eq!(page.states.total(), distinct.len());
            for key in distinct {
                let memberships = RestoreState::ALL
                    .iter()
                    .filter(|state| page.states.get(**state).contains(key))
                    .count();
                prop_assert_eq!(memberships, 1, "key {} is in {} sets", key, memberships);
            }
        }

        #[test]
        fn folder_markers_are_always_skipped(
            key in arb_key(),
            descriptor in arb_descriptor(),
            restore_requested in any::<bool>(),
        ) {
            let classification = classify(&key, descriptor.as_deref(), restore_requested);
            prop_assert_eq!(
                classification.state == RestoreState::SkippedFolder,
                is_folder_marker(&key)
            );
        }

        #[test]
        fn unparseable_descriptor_keeps_raw_text(raw in "[A-Za-z0-9 ,;:]{1,40}") {
            prop_assume!(!raw.contains("ongoing-request"));

            let classification = classify("data/x.bin", Some(&raw), false);
            prop_assert_eq!(classification.state, RestoreState::Unknown);
            prop_assert!(classification.note.unwrap().contains(&raw));
        }

        #[test]
        fn totals_merge_order_does_not_matter(
            entries in prop::collection::btree_map(arb_key(), arb_descriptor(), 1..40),
            split in 0usize..40,
        ) {
            let split = split.min(entries.len());
            let mut first = PageSummary::new(0, 0);
            let mut second = PageSummary::new(0, 1);
            for (n, (key, descriptor)) in entries.iter().enumerate() {
                let classification = classify(key, descriptor.as_deref(), false);
                if n < split {
                    first.record(key, classification);
                } else {
                    second.record(key, classification);
                }
            }

            let mut forward = RestoreTotals::new();
            forward.merge_page(&first);
            forward.merge_page(&second);
            let mut backward = RestoreTotals::new();
            backward.merge_page(&second);
            backward.merge_page(&first);

            prop_assert_eq!(forward.counts(), backward.counts());
            prop_assert_eq!(forward.states, backward.states);
        }
    }
}
