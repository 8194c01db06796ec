// Run totals do not depend on the worker count, the page size, or how the
// work list overlaps; each key is issued at most once.

#[cfg(test)]
mod tests {
    use crate::pipeline::RestorePipeline;
    use crate::summary::RestoreTotals;
    use crate::test_utils::{FINISHED, MockStorage, ONGOING, make_test_config};
    use crate::types::Operation;
    use crate::types::token::create_pipeline_cancellation_token;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::io::Write;

    fn storage_for(layout: &[u8]) -> MockStorage {
        layout
            .iter()
            .enumerate()
            .fold(MockStorage::new_with_stats(), |storage, (n, kind)| {
                let dir = n % 3;
                match kind % 4 {
                    0 => storage.with_object(&format!("d{dir}/{n:03}.bin"), None),
                    1 => storage.with_object(&format!("d{dir}/{n:03}.bin"), Some(ONGOING)),
                    2 => storage.with_object(&format!("d{dir}/{n:03}.bin"), Some(FINISHED)),
                    _ => storage.with_object(&format!("d{dir}/{n:03}/"), None),
                }
            })
    }

    fn run_once(
        layout: &[u8],
        work_list: &[&str],
        worker_size: u16,
        max_keys: i32,
    ) -> (RestoreTotals, Vec<String>) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in work_list {
            writeln!(file, "{line}").unwrap();
        }

        let storage = storage_for(layout);
        let mut config = make_test_config();
        config.operation = Operation::Restore;
        config.work_list = file.path().to_path_buf();
        config.worker_size = worker_size;
        config.max_keys = max_keys;

        let rt = tokio::runtime::Runtime::new().unwrap();
        let totals = rt.block_on(async {
            let mut pipeline = RestorePipeline::with_storage(
                config,
                Box::new(storage.clone()),
                storage.stats_receiver(),
                create_pipeline_cancellation_token(),
            );
            pipeline.run().await;
            assert!(!pipeline.has_error());
            pipeline.get_totals().cloned().unwrap()
        });

        (totals, storage.restore_calls())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn totals_independent_of_worker_count_and_page_size(
            layout in prop::collection::vec(any::<u8>(), 0..80),
            worker_size in 1u16..40,
            max_keys in 1i32..20,
        ) {
            let work_list = ["d0/", "d1/", "#d2/"];
            let (sequential, _) = run_once(&layout, &work_list, 1, 1000);
            let (concurrent, _) = run_once(&layout, &work_list, worker_size, max_keys);

            prop_assert_eq!(sequential, concurrent);
        }

        #[test]
        fn overlapping_work_items_issue_each_key_at_most_once(
            layout in prop::collection::vec(any::<u8>(), 1..60),
            worker_size in 1u16..16,
        ) {
            let work_list = ["d0/", "d", "d0/", "s3://test-bucket/d1/"];
            let (totals, restore_calls) = run_once(&layout, &work_list, worker_size, 3);

            let distinct: HashSet<&String> = restore_calls.iter().collect();
            prop_assert_eq!(distinct.len(), restore_calls.len());
            for key in &restore_calls {
                prop_assert!(!key.ends_with('/'));
                prop_assert!(totals.contains(key));
            }
            prop_assert_eq!(totals.counts().keys as usize, layout.len());
        }
    }
}
