/// Initialize the process-wide tracing subscriber.
///
/// Honors `RUST_LOG` if set; otherwise defaults to `warn`, except when
/// `CTF_FS_DEBUG=1` is set, in which case the crate's own targets are bumped to `debug`.
pub fn try_init_tracing_subscriber() -> Result<(), Box<dyn std::error::Error>> {
    let builder = tracing_subscriber::fmt::Subscriber::builder();
    let env_filter = std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV)
        .map(tracing_subscriber::EnvFilter::new)
        .unwrap_or_else(|_| {
            let level = if std::env::var("CTF_FS_DEBUG").as_deref() == Ok("1") {
                tracing::Level::DEBUG
            } else {
                tracing::Level::WARN
            };
            tracing_subscriber::EnvFilter::new(format!(
                "{}={},ctf_fs={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
                level,
            ))
        });
    let builder = builder.with_env_filter(env_filter);
    let subscriber = builder.finish();
    use tracing_subscriber::util::SubscriberInitExt;
    subscriber.try_init()?;
    Ok(())
}
