//! ztd entry point.

use log::{error, warn};

use ztd::cli::{self, Cli};
use ztd::compose::ComposeProject;
use ztd::config::Config;
use ztd::deploy::Deployer;
use ztd::runtime::DockerRuntime;

#[tokio::main]
async fn main() {
    // Docker probes plugins with this pseudo-argument; answer before any
    // other processing.
    if std::env::args().nth(1).as_deref() == Some(cli::METADATA_ARG) {
        cli::print_plugin_metadata();
        return;
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let project = ComposeProject::new(config.compose_files.clone(), config.env_files.clone());
    let runtime = match DockerRuntime::connect(project.clone()) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create Docker client: {}", e);
            std::process::exit(1);
        }
    };

    let deployer = Deployer::new(&runtime, &project, &config);
    if let Err(e) = deployer.run(&cli.service).await {
        // A failed publish after a successful swap is a warning-grade
        // outcome, distinct from a failed deployment.
        if e.is_publish() {
            warn!("{}", e);
        } else {
            error!("{}", e);
        }
        std::process::exit(1);
    }
}
