use clap::Parser;
use impload_runner::{run, Cli};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    impload_link::describe_metrics();

    if let Err(e) = run(&cli) {
        eprintln!("impload: {}", e);
        std::process::exit(1);
    }
}
