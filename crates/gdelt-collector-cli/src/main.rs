use gdelt_collector_lib::cli::{Command, parse_args, run_process, run_service};
use gdelt_collector_lib::error::CollectorError;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), CollectorError> {
    color_eyre::install()?;

    let args = parse_args();

    match args.command {
        Command::Run { config_path } => {
            run_service(&config_path).await?;
        }
        Command::Process { config_path } => {
            run_process(&config_path).await?;
        }
    }

    Ok(())
}
