// Verbosity flags map onto the tracing level, with Info as the default so
// status lines are shown; JSON and colour flags pass straight through.

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::config::args::parse_from_args;
    use proptest::prelude::*;

    /// clap_verbosity_flag with an Info default:
    ///   -qqq → off, -qq → Error, -q → Warn, (none) → Info,
    ///   -v → Debug, -vv → Trace
    fn arb_verbosity_flags() -> impl Strategy<Value = (Vec<&'static str>, Option<log::Level>)> {
        prop_oneof![
            Just((vec!["-qqq"], None)),
            Just((vec!["-qq"], Some(log::Level::Error))),
            Just((vec!["-q"], Some(log::Level::Warn))),
            Just((vec![], Some(log::Level::Info))),
            Just((vec!["-v"], Some(log::Level::Debug))),
            Just((vec!["-vv"], Some(log::Level::Trace))),
        ]
    }

    fn base_args() -> Vec<&'static str> {
        vec![
            "s3thaw",
            "status",
            "--bucket",
            "test-bucket",
            "--work-list",
            "Cargo.toml",
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn verbosity_sets_tracing_level((flags, expected_level) in arb_verbosity_flags()) {
            let mut args = base_args();
            args.extend(flags);

            let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();
            prop_assert_eq!(
                config.tracing_config.map(|tracing_config| tracing_config.tracing_level),
                expected_level
            );
        }

        #[test]
        fn output_flags_pass_through(
            json in any::<bool>(),
            aws_sdk in any::<bool>(),
            span_events in any::<bool>(),
            disable_color in any::<bool>(),
        ) {
            let mut args = base_args();
            if json {
                args.push("--json-tracing");
            }
            if aws_sdk {
                args.push("--aws-sdk-tracing");
            }
            if span_events {
                args.push("--span-events-tracing");
            }
            if disable_color {
                args.push("--disable-color-tracing");
            }

            let config = Config::try_from(parse_from_args(args).unwrap()).unwrap();
            let tracing_config = config.tracing_config.unwrap();
            prop_assert_eq!(tracing_config.json_tracing, json);
            prop_assert_eq!(tracing_config.aws_sdk_tracing, aws_sdk);
            prop_assert_eq!(tracing_config.span_events_tracing, span_events);
            prop_assert_eq!(tracing_config.disable_color_tracing, disable_color);
        }
    }
}
