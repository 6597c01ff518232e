/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// For binaries and demos; libraries embedding `dog-upload` should install
/// their own subscriber. Returns an error if one is already set.
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
}
