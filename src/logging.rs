use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "mover_mlp=info";

/// Install a compact stderr subscriber. `RUST_LOG` overrides the default
/// `info` level for this crate
pub fn init_logging() -> Result<(), SetGlobalDefaultError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}
