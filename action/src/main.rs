//! deployit-action - Entry Point
//!
//! Packages a DAR archive, publishes it to a Deploy server and deploys it,
//! as selected by the `action` input.

use clap::Parser;
use tracing::{error, info};

use deployit_action::app::options::{ActionInputs, ActionOptions};
use deployit_action::app::outputs::{error_annotation, ActionReporter};
use deployit_action::app::run::run;
use deployit_action::logs::{init_logging, LogOptions};
use deployit_action::utils::version_info;

#[tokio::main]
async fn main() {
    let inputs = ActionInputs::parse();

    // Initialize logging
    let log_options = match ActionOptions::log_options(&inputs) {
        Ok(options) => options,
        Err(e) => {
            println!("{}", error_annotation(&e.to_string()));
            LogOptions::default()
        }
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    let version = version_info();
    info!(
        "deployit-action {} ({}, built {})",
        version.version, version.git_hash, version.build_time
    );

    let reporter = ActionReporter::from_env();
    let result = match ActionOptions::from_inputs(inputs) {
        Ok(options) => run(options, &reporter).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!("{}", e);
        println!("{}", error_annotation(&e.to_string()));
        std::process::exit(1);
    }
}
