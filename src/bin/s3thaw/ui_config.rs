// Whether to show the progress indicator and the result line.

use s3thaw_rs::config::Config;

/// The live progress line is shown only when tracing leaves the terminal
/// mostly quiet: not with `--show-no-progress`, not above Warn, not with JSON.
pub fn is_progress_indicator_needed(config: &Config) -> bool {
    if config.show_no_progress {
        return false;
    }

    let Some(tracing_config) = config.tracing_config.as_ref() else {
        return true;
    };

    if log::Level::Warn < tracing_config.tracing_level {
        return false;
    }

    !tracing_config.json_tracing
}

/// The final result line is suppressed by `--show-no-progress` and JSON logs.
pub fn is_show_result_needed(config: &Config) -> bool {
    if config.show_no_progress {
        return false;
    }

    config
        .tracing_config
        .as_ref()
        .is_none_or(|tracing_config| !tracing_config.json_tracing)
}
