pub mod cancel;
pub mod utils;

/// Install an env-filtered subscriber writing to the test capture, so tests
/// exercising diagnostic paths surface their logs under `RUST_LOG`. Repeat
/// installs are ignored.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
