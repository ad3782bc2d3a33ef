use anyhow::Context;
use clap::Parser;

use expat_shim::{Cli, ProbeReport, ShimConfig, SystemEnvProvider};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config = match &cli.config {
        Some(path) => ShimConfig::load_with_file(path, &SystemEnvProvider)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => ShimConfig::load().context("failed to load configuration")?,
    };
    if let Some(library) = &cli.library {
        config.library_path = library.clone();
    }
    config.validate()?;

    expat_shim::configure(config)?;
    let binding = expat_shim::global();

    let report = ProbeReport::collect(binding, &cli.files, cli.encoding.as_deref());
    println!("{}", report.render(cli.format));

    std::process::exit(report.exit_code());
}
