use clap::Parser;
use galleria::cli::{Cli, Commands};
use galleria::{Config, run, seed};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load()?;
    let worker_threads = config.general.worker_threads;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();

    if worker_threads > 0 {
        builder.worker_threads(worker_threads);
    }

    let runtime = builder.build()?;

    match cli.command {
        Some(Commands::Seed) => runtime.block_on(seed(config)),
        Some(Commands::Serve) | None => runtime.block_on(run(config)),
    }
}
