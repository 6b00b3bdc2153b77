use anyhow::Result;
use std::env;
use tracing_subscriber::EnvFilter;

use initmgr::cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();

    let invocation = match cli::parse(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprint!("{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    let code = cli::run(&invocation)?;
    std::process::exit(code);
}
