use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing::{debug, error, info, trace, warn};

use s3thaw_rs::config::Config;
use s3thaw_rs::{
    CLIArgs, RestorePipeline, RestoreTotals, S3thawError, create_pipeline_cancellation_token,
    exit_code_from_error, is_cancelled_error,
};

mod ctrl_c_handler;
pub mod indicator;
mod tracing_init;
pub mod ui_config;

/// s3thaw - reconcile and request S3 Glacier restores for a list of folders.
///
/// This binary is a thin wrapper over the s3thaw-rs library.
#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config_exit_if_err();

    if let Some(shell) = config.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "s3thaw",
            &mut std::io::stdout(),
        );

        return Ok(());
    }

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    let exit_code = run(config).await?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}

/// Configuration errors exit with code 2 (clap's usage error code).
#[cfg_attr(coverage_nightly, coverage(off))]
fn load_config_exit_if_err() -> Config {
    match Config::try_from(CLIArgs::parse()) {
        Ok(config) => config,
        Err(error_message) => {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit()
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    let Some(tracing_config) = config.tracing_config.as_ref() else {
        return false;
    };

    tracing_init::init_tracing(tracing_config);
    true
}

async fn run(config: Config) -> Result<i32> {
    let cancellation_token = create_pipeline_cancellation_token();

    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

    let start_time = tokio::time::Instant::now();
    debug!("restore pipeline start.");

    let mut pipeline = RestorePipeline::new(config.clone(), cancellation_token.clone()).await;
    let indicator_join_handle = indicator::show_indicator(
        pipeline.get_stats_receiver(),
        ui_config::is_progress_indicator_needed(&config),
        ui_config::is_show_result_needed(&config),
    );

    pipeline.run().await;
    indicator_join_handle.await?;

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());

    if pipeline.has_error() {
        let errors = pipeline.get_errors_and_consume().unwrap_or_default();
        for err in &errors {
            if is_cancelled_error(err) {
                info!(duration_sec = duration_sec, "s3thaw was cancelled.");
                return Ok(0);
            }
            error!("{}", err);
        }
        error!(duration_sec = duration_sec, "s3thaw failed.");
        return Ok(errors.first().map(exit_code_from_error).unwrap_or(1));
    }

    let exit_code = pipeline.get_totals().map(exit_code_for_totals).unwrap_or(0);

    debug!(duration_sec = duration_sec, "s3thaw has been completed.");

    Ok(exit_code)
}

/// 0 when every eligible object is restored, otherwise the `Incomplete` exit
/// code so scripts can poll until done.
fn exit_code_for_totals(totals: &RestoreTotals) -> i32 {
    if totals.verdict().is_complete() {
        return 0;
    }

    let counts = totals.counts();
    let incomplete = S3thawError::Incomplete {
        finished: counts.finished,
        eligible: counts.eligible(),
    };
    warn!("{}", incomplete);
    incomplete.exit_code()
}
