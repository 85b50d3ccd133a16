use env_logger::{Builder, Env};

/// Environment variable holding an `env_logger` filter, e.g. `handctl=debug`.
pub const LOG_ENV: &str = "HANDCTL_LOG";

pub fn init() {
    let env = Env::default().filter_or(LOG_ENV, "info");
    // a second init (tests, embedding) is harmless
    let _ = Builder::from_env(env).format_timestamp_millis().try_init();
}
