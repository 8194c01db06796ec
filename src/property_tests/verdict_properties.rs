// The run is complete exactly when every non-folder key is finished.

#[cfg(test)]
mod tests {
    use crate::classifier::Classification;
    use crate::summary::{PageSummary, RestoreTotals, Verdict};
    use crate::types::RestoreState;
    use proptest::prelude::*;

    fn totals_with(counts: [usize; 5]) -> RestoreTotals {
        let mut page = PageSummary::new(0, 0);
        for (state, count) in RestoreState::ALL.iter().zip(counts) {
            for n in 0..count {
                page.record(
                    &format!("{}/{n}", state.as_str()),
                    Classification::new(*state, None),
                );
            }
        }
        let mut totals = RestoreTotals::new();
        totals.merge_page(&page);
        totals
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(300))]

        #[test]
        fn complete_iff_eligible_equals_finished(counts in prop::array::uniform5(0usize..12)) {
            let totals = totals_with(counts);
            let state_counts = totals.counts();
            let [not_requested, in_progress, finished, unknown, _] = counts;

            prop_assert_eq!(state_counts.keys as usize, counts.iter().sum::<usize>());
            prop_assert_eq!(state_counts.eligible() as usize, not_requested + in_progress + finished + unknown);
            prop_assert_eq!(
                totals.verdict().is_complete(),
                not_requested + in_progress + unknown == 0
            );
        }

        #[test]
        fn none_requested_only_when_everything_eligible_is_not_requested(
            counts in prop::array::uniform5(0usize..12),
        ) {
            let totals = totals_with(counts);
            let [not_requested, in_progress, finished, unknown, _] = counts;
            let eligible = not_requested + in_progress + finished + unknown;

            let expected = if eligible == finished {
                Verdict::Complete
            } else if eligible == not_requested {
                Verdict::NotRequested
            } else {
                Verdict::InProgress
            };
            prop_assert_eq!(totals.verdict(), expected);
        }
    }

    #[test]
    fn ten_keys_two_folders() {
        assert_eq!(totals_with([0, 0, 8, 0, 2]).verdict(), Verdict::Complete);
        assert_eq!(totals_with([0, 1, 7, 0, 2]).verdict(), Verdict::InProgress);
    }
}
