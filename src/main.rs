use clap::{Parser, Subcommand};
use log::{error, info};
use macflow::configuration::{CaptureBackend, Config};
use macflow::controller::Controller;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "macflow")]
#[command(version)]
#[command(about = "Live MAC and IP address discovery from captured traffic")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web interface and manage the capture process
    Serve {
        /// TOML configuration file; defaults apply when omitted
        config_file: Option<PathBuf>,
        /// Override web.port
        #[arg(long, env = "MACFLOW_PORT")]
        port: Option<u16>,
    },
    /// Capture on an interface and publish the address pairs seen
    Publish {
        /// Interface to listen on, for example eth0 or wlan0
        #[arg(long)]
        interface: String,
        /// Override pubsub.bind
        #[arg(long)]
        bind: Option<String>,
        #[arg(long, value_enum, default_value_t = CaptureBackend::Tcpdump)]
        backend: CaptureBackend,
        /// Override capture.tcpdump_program
        #[arg(long)]
        tcpdump: Option<String>,
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&PathBuf>) -> Config {
    match path {
        Some(path) => Config::from_file(path).unwrap_or_else(|e| {
            error!("Unable to import configuration from file: {}", e);
            std::process::exit(1);
        }),
        None => {
            info!("No configuration file given, using defaults");
            Config::default()
        }
    }
}

fn build_controller(config: Config) -> Controller {
    Controller::new(config).unwrap_or_else(|e| {
        error!("Unable to create a controller instance: {}, exiting...", e);
        std::process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Command::Serve { config_file, port } => {
            println!(
                "
███╗   ███╗ █████╗  ██████╗███████╗██╗      ██████╗ ██╗    ██╗
████╗ ████║██╔══██╗██╔════╝██╔════╝██║     ██╔═══██╗██║    ██║
██╔████╔██║███████║██║     █████╗  ██║     ██║   ██║██║ █╗ ██║
██║╚██╔╝██║██╔══██║██║     ██╔══╝  ██║     ██║   ██║██║███╗██║
██║ ╚═╝ ██║██║  ██║╚██████╗██║     ███████╗╚██████╔╝╚███╔███╔╝
╚═╝     ╚═╝╚═╝  ╚═╝ ╚═════╝╚═╝     ╚══════╝ ╚═════╝  ╚══╝╚══╝ 
==============================================================
        Live MAC and IP address discovery v{}
==============================================================
",
                env!("CARGO_PKG_VERSION")
            );

            info!("Importing configuration");
            let mut config = load_config(config_file.as_ref());
            if let Some(port) = port {
                config.web.port = port;
            }
            info!("Configuration imported successfully");

            let mut controller = build_controller(config);
            if let Some(path) = config_file {
                // capture processes may run from another directory
                let path = std::fs::canonicalize(&path).unwrap_or(path);
                controller = controller.with_config_file(path);
            }
            controller.run().await
        }
        Command::Publish {
            interface,
            bind,
            backend,
            tcpdump,
            config,
        } => {
            let controller = build_controller(load_config(config.as_ref()));
            let mut options = controller.publish_options(interface);
            options.backend = backend;
            if let Some(bind) = bind {
                options.bind = bind;
            }
            if let Some(tcpdump) = tcpdump {
                options.tcpdump_program = tcpdump;
            }
            controller.publish(options).await
        }
    };

    if let Err(e) = result {
        error!("Error occured in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }
}
