use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, filter::Targets, fmt, prelude::__tracing_subscriber_SubscriberExt,
    util::SubscriberInitExt,
};

const CRATE_TARGET: &str = "exrate";

/// Level for this crate's own events. Warnings stay visible so a failed
/// fetch is reported even without `--verbose`.
fn crate_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    }
}

/// Restricts output to this crate; dependencies such as reqwest and fjall
/// only show up when `RUST_LOG` asks for them.
fn crate_targets(verbose: bool) -> Targets {
    Targets::new().with_target(CRATE_TARGET, crate_level(verbose))
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(crate_level(verbose).into()))
}

/// Installs the global subscriber, writing to stderr so command output on
/// stdout stays clean.
pub fn init_logging(verbose: bool) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .pretty()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(crate_targets(verbose))
        .with(env_filter(verbose))
        .init();
}
