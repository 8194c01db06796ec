//! Status lines and the progress file.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::summary::{PageSummary, RestoreTotals, StateCounts, Verdict};
use crate::types::Operation;
use crate::types::error::S3thawError;

/// What is being run and since when. Throughput is measured against it.
#[derive(Debug, Clone, Copy)]
pub struct RunContext {
    pub operation: Operation,
    pub started_at: Instant,
}

impl RunContext {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            started_at: Instant::now(),
        }
    }

    pub fn objects_per_sec(&self, count: u64) -> f64 {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            count as f64 / elapsed
        } else {
            0.0
        }
    }
}

pub struct Reporter {
    run_context: RunContext,
    progress_file: Option<PathBuf>,
}

impl Reporter {
    pub fn new(run_context: RunContext, progress_file: Option<PathBuf>) -> Self {
        Self {
            run_context,
            progress_file,
        }
    }

    /// One line per processed page. `processed` is the run-wide key count so far.
    pub fn report_page(&self, item: &str, page: &PageSummary, processed: u64) {
        info!(
            item = item,
            page_index = page.page_index,
            keys = page.len(),
            "processed page {} of {}: {} objects ({:.2} objects/sec).",
            page.page_index,
            item,
            page.len(),
            self.run_context.objects_per_sec(processed),
        );
    }

    /// Report one finished work item.
    pub fn report_item(&self, item: &str, totals: &RestoreTotals) -> Result<()> {
        let name = format!("{} folder {}", self.run_context.operation, item);
        self.report(&name, totals)
    }

    /// Report the whole run.
    pub fn report_run(&self, totals: &RestoreTotals) -> Result<()> {
        let name = format!("{} run total", self.run_context.operation);
        self.report(&name, totals)
    }

    fn report(&self, name: &str, totals: &RestoreTotals) -> Result<()> {
        let counts = totals.counts();
        let verdict = totals.verdict();

        info!(
            keys = counts.keys,
            not_requested = counts.not_requested,
            in_progress = counts.in_progress,
            finished = counts.finished,
            unknown = counts.unknown,
            skipped_folders = counts.skipped_folders,
            "{}",
            status_sentence(name, &counts)
        );
        let message = verdict.message(self.run_context.operation);
        if verdict == Verdict::Complete {
            info!(verdict = %verdict, "{message}");
        } else {
            warn!(verdict = %verdict, "{message}");
        }

        if let Some(path) = &self.progress_file {
            let block = progress_block(
                name,
                totals,
                self.run_context.objects_per_sec(counts.keys),
            );
            append_progress_block(path, &block)?;
        }

        Ok(())
    }
}

/// `Status Report For "<name>" Operation. Of the N total files, ...`
pub fn status_sentence(name: &str, counts: &StateCounts) -> String {
    format!(
        "Status Report For \"{name}\" Operation. Of the {} total files, {} are finished being restored, \
         {} have a restore in progress, {} have not been requested to be restored yet, \
         {} reported an unknown restore status, and {} were asked to be skipped.",
        counts.keys,
        counts.finished,
        counts.in_progress,
        counts.not_requested,
        counts.unknown,
        counts.skipped_folders,
    )
}

/// Header line, then every in-progress key, then `# <key> - <note>` lines.
pub fn progress_block(name: &str, totals: &RestoreTotals, objects_per_sec: f64) -> String {
    let counts = totals.counts();
    let mut block = format!(
        "# {name} keys={} not_requested={} in_progress={} finished={} unknown={} skipped_folders={} objects_per_sec={:.2}\n",
        counts.keys,
        counts.not_requested,
        counts.in_progress,
        counts.finished,
        counts.unknown,
        counts.skipped_folders,
        objects_per_sec,
    );
    for key in &totals.states.in_progress {
        block.push_str(key);
        block.push('\n');
    }
    for (key, note) in &totals.notes {
        let _ = writeln!(block, "# {key} - {note}");
    }
    block
}

fn append_progress_block(path: &Path, block: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| S3thawError::Io(format!("{}: {e}", path.display())))
        .context("failed to open the progress file.")?;

    file.write_all(block.as_bytes())
        .map_err(|e| S3thawError::Io(format!("{}: {e}", path.display())))
        .context("failed to write the progress file.")?;

    Ok(())
}
