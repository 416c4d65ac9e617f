use attendance::Config;
use attendance::app;
use clap::Parser;

/// Main entry point for the web application
///
/// Reads the configuration from the command line and environment, sets up
/// logging and runs the server until it is stopped.
///
/// # Default Configuration
/// * Listens on 0.0.0.0:5000
/// * Reads the roster from `students.csv` and logs presence to `present.txt`
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    app::run(config).await
}
