//! Gateway entry point: logging, configuration, listener.

use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, fmt};

use backend::server::{self, AppConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "configuration invalid");
            eprintln!("configuration invalid: {err}");
            std::process::exit(1);
        }
    };

    server::run(config).await
}
