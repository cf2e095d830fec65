use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging to stderr so stdout stays clean for results.
///
/// `RUST_LOG` wins when set; otherwise `level` applies to both the CLI and
/// the core crate.
pub fn init_logging(level: &str) {
    let default_filter = format!("storage_eval={level},storage_eval_core={level}");
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(atty::is(atty::Stream::Stderr))
                .with_target(true)
                .with_thread_ids(false),
        )
        .init();

    tracing::debug!("storage-eval logging initialized (level={level})");
}
