// src/main.rs

use borgsnap::errors::failure_report;
use borgsnap::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("borgsnap error: {err:?}");
        std::process::exit(borgsnap::errors::EXIT_FAILURE);
    }

    if let Err(err) = run(args).await {
        eprintln!("{}", failure_report(&err));
        std::process::exit(err.exit_code());
    }
}
