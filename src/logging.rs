use env_logger::{Builder, Env};

/// `info` unless RUST_LOG says otherwise, e.g. `RUST_LOG=intentctl=trace`.
pub fn init() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}
