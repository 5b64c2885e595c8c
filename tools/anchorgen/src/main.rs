use anchorgen::cli::{Cli, Commands};
use clap::Parser;
use miette::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    miette::set_panic_hook();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    match args.action {
        Commands::Shapes(opts) => opts.shapes()?,
        Commands::Generate(opts) => opts.generate()?,
    }

    Ok(())
}
