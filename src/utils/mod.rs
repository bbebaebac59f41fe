pub mod build_info;
pub mod paths;

/// Installs the global tracing subscriber with sensible defaults.
///
/// `RUST_LOG` refines the filter; events go to stderr so script output on
/// stdout stays clean. Installing twice is harmless: the second attempt is
/// ignored.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "form_core=info".parse() {
        filter = filter.add_directive(directive);
    }

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
