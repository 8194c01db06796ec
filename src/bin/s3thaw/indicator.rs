// Progress indicator.
//
// Reads RestoreStatistics from the stats channel and shows a live line with
// a moving average of classified objects per second.

use std::io;
use std::io::Write;

use async_channel::Receiver;
use indicatif::{HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use s3thaw_rs::{RestoreState, RestoreStatistics};
use simple_moving_average::{SMA, SumTreeSMA};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

/// Counters collected from the stats channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorSummary {
    pub classified: u64,
    pub not_requested: u64,
    pub in_progress: u64,
    pub finished: u64,
    pub unknown: u64,
    pub skipped_folders: u64,
    pub restore_requested: u64,
    pub restore_errors: u64,
    pub pages: u64,
    pub page_errors: u64,
}

impl IndicatorSummary {
    /// Returns 1 for a classified object, so the caller can feed the
    /// per-period rate.
    fn record(&mut self, stats: RestoreStatistics) -> u64 {
        match stats {
            RestoreStatistics::ObjectClassified { state, .. } => {
                self.classified += 1;
                match state {
                    RestoreState::NotRequested => self.not_requested += 1,
                    RestoreState::InProgress => self.in_progress += 1,
                    RestoreState::Finished => self.finished += 1,
                    RestoreState::Unknown => self.unknown += 1,
                    RestoreState::SkippedFolder => self.skipped_folders += 1,
                }
                return 1;
            }
            RestoreStatistics::RestoreRequested { .. } => self.restore_requested += 1,
            RestoreStatistics::RestoreError { .. } => self.restore_errors += 1,
            RestoreStatistics::PageComplete { .. } => self.pages += 1,
            RestoreStatistics::PageError { .. } => self.page_errors += 1,
        }
        0
    }

    fn progress_line(&self, objects_per_sec: u64) -> String {
        format!(
            "{:>3} objects | {:>3} objects/sec,  finished {},  in progress {},  not requested {},  unknown {},  requested {},  request errors {}",
            self.classified,
            HumanCount(objects_per_sec),
            self.finished,
            self.in_progress,
            self.not_requested,
            self.unknown,
            self.restore_requested,
            self.restore_errors,
        )
    }
}

/// Moving average window in seconds (samples).
const MOVING_AVERAGE_PERIOD_SECS: usize = 10;

/// How often (in seconds) to refresh the progress display.
const REFRESH_INTERVAL: f32 = 1.0;

/// Spawn a task that drains `stats_receiver` until it is closed.
///
/// `show_progress` controls the live line, `show_result` the final line. The
/// summary is always logged at info level.
pub fn show_indicator(
    stats_receiver: Receiver<RestoreStatistics>,
    show_progress: bool,
    show_result: bool,
) -> JoinHandle<IndicatorSummary> {
    let progress_text = ProgressBar::new(0);
    if let Ok(progress_style) = ProgressStyle::with_template("{wide_msg}") {
        progress_text.set_style(progress_style);
    }

    tokio::spawn(async move {
        let start_time = Instant::now();

        let mut ma_classified = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();
        let mut summary = IndicatorSummary::default();

        loop {
            let mut period_count: u64 = 0;

            let period = Instant::now();
            loop {
                while let Ok(stats) = stats_receiver.try_recv() {
                    period_count += summary.record(stats);
                }

                if REFRESH_INTERVAL < period.elapsed().as_secs_f32() {
                    break;
                }

                if stats_receiver.is_closed() && stats_receiver.is_empty() {
                    let elapsed = start_time.elapsed();
                    let elapsed_secs_f64 = elapsed.as_secs_f64();

                    let objects_per_sec = if elapsed_secs_f64 < REFRESH_INTERVAL as f64 {
                        summary.classified
                    } else {
                        (summary.classified as f64 / elapsed_secs_f64) as u64
                    };

                    info!(
                        message = "restore summary",
                        objects = summary.classified,
                        objects_per_sec = objects_per_sec,
                        finished = summary.finished,
                        in_progress = summary.in_progress,
                        not_requested = summary.not_requested,
                        unknown = summary.unknown,
                        skipped_folders = summary.skipped_folders,
                        restore_requested = summary.restore_requested,
                        restore_errors = summary.restore_errors,
                        pages = summary.pages,
                        page_errors = summary.page_errors,
                        duration_sec = elapsed_secs_f64,
                    );

                    if show_result {
                        if let Ok(result_style) = ProgressStyle::with_template("{msg}") {
                            progress_text.set_style(result_style);
                        }
                        progress_text.finish_with_message(format!(
                            "{},  duration {}",
                            summary.progress_line(objects_per_sec),
                            HumanDuration(elapsed),
                        ));

                        println!();
                        let _ = io::stdout().flush();
                    }

                    return summary;
                }

                tokio::time::sleep(std::time::Duration::from_secs_f32(0.05)).await;
            }

            ma_classified.add_sample(period_count);

            if show_progress {
                progress_text.set_message(summary.progress_line(ma_classified.get_average()));
            }
        }
    })
}
