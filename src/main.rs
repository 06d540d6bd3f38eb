use std::path::PathBuf;

use anyhow::Context;
use applier::{configuration::get_configuration, startup::run};
use clap::Parser;
use env_logger::Env;

#[derive(Parser, Debug)]
#[command(version, about = "Searches hh.ru and applies to matching vacancies", long_about = None)]
struct Cli {
    /// Folder with secrets.yaml, search_config.yaml and structured_resume.yaml
    #[arg(long, default_value = "data_folder")]
    data_folder: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let configuration = get_configuration(&cli.data_folder).context("Failed to read configuration.")?;

    env_logger::Builder::from_env(
        Env::default().default_filter_or(configuration.settings.log_level.as_str()),
    )
    .init();

    let applied = run(configuration).await?;
    log::info!("Done, {} applications sent", applied);

    Ok(())
}
