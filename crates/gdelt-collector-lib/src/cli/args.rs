use clap::Arg;
use tracing::Level;
use tracing_subscriber;

#[derive(Debug, Clone)]
pub enum Command {
    /// Run the collector service: scheduled checks, retry loop, HTTP trigger.
    Run { config_path: String },
    /// Run a single manifest check and exit.
    Process { config_path: String },
}

pub struct Args {
    pub command: Command,
    pub log_level: Level,
}

pub fn parse_args() -> Args {
    let matches = clap::Command::new("gdelt-collector")
        .version("1.0.0")
        .about("Collect GDELT translation archives, store their contents and announce them downstream")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Sets the level of verbosity")
                .action(clap::ArgAction::Count)
                .global(true),
        )
        .subcommand(
            clap::Command::new("run")
                .about("Run the collector service until interrupted")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("Sets a custom config file")
                        .required(false)
                        .default_value("config.yaml"),
                ),
        )
        .subcommand(
            clap::Command::new("process")
                .about("Run a single manifest check and exit")
                .arg(
                    Arg::new("config")
                        .short('c')
                        .long("config")
                        .value_name("FILE")
                        .help("Sets a custom config file")
                        .required(false)
                        .default_value("config.yaml"),
                ),
        )
        .get_matches();

    let log_level = match matches.get_count("verbose") {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy()
                .add_directive("rdkafka=warn".parse().unwrap()),
        )
        .init();

    let command = match matches.subcommand() {
        Some(("run", sub_matches)) => Command::Run {
            config_path: sub_matches
                .get_one::<String>("config")
                .expect("Default config path should exist")
                .clone(),
        },
        Some(("process", sub_matches)) => Command::Process {
            config_path: sub_matches
                .get_one::<String>("config")
                .expect("Default config path should exist")
                .clone(),
        },
        _ => {
            eprintln!("No subcommand provided. Use 'run' or 'process'.");
            std::process::exit(1);
        }
    };

    Args { command, log_level }
}
