//! Mission control system binary
use clap::Parser;
use log::{error, info};
use skylink::components::prelude::*;

/// Arguments required for starting the program from the command line.
#[derive(Parser, Debug)]
struct Args {
    /// Path to the config file for the Mission Control Component.
    #[arg(short, long)]
    filepath: String,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();
    let component =
        MissionControl::from_config_file(&args.filepath).expect("Failed to load the config");
    info!("Starting mission control {}", component.get_uuid());

    match MissionControlController::start(component).await {
        Ok(()) => info!("Mission control stopped"),
        Err(e) => {
            error!("Mission control failed {e}");
            std::process::exit(1);
        }
    }
}
