use bankscrape_cli::cli::Cli;
use bankscrape_cli::{logging, run};
use clap::Parser;
use clap::error::ErrorKind;
use tracing::error;

#[tokio::main]
async fn main() {
	let cli = match Cli::try_parse() {
		Ok(cli) => cli,
		Err(err) => {
			let code = match err.kind() {
				ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
				_ => 1,
			};
			let _ = err.print();
			std::process::exit(code);
		}
	};
	logging::init_logging(cli.verbose, cli.trace);

	match run::dispatch(cli.command).await {
		Ok(code) => std::process::exit(code),
		Err(err) => {
			let message = format!("{err:#}");
			error!(target = "bankscrape", error = %message, "command failed");
			std::process::exit(1);
		}
	}
}
