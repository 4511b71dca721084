//! Tracing bootstrap: an `EnvFilter` driven by `RUST_LOG` (defaulting to
//! `info`), with the output format selected by config so production
//! deployments can switch to JSON.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;

pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
}
