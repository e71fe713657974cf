/// Log an error (and each error which caused it) as a warning.
pub fn log_error(context: &str, err: &anyhow::Error) {
    tracing::warn!("{}: {}", context, err);
    for cause in err.chain().skip(1) {
        tracing::warn!("Caused by: {}", cause);
    }
}
