use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber. `RUST_LOG` directives are honoured;
/// this crate logs at info unless told otherwise.
pub fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "pulse_service=info".parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
