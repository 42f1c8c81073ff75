use std::path::PathBuf;

use clap::builder::NonEmptyStringValueParser;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bankscrape")]
#[command(about = "Export transactions and balances from an online banking portal")]
#[command(version)]
#[command(arg_required_else_help = true)]
pub struct Cli {
	/// Debug output
	#[arg(short, long, global = true)]
	pub verbose: bool,

	/// Trace output, including DevTools traffic
	#[arg(short, long, global = true)]
	pub trace: bool,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Extract transactions for the selected accounts
	#[command(arg_required_else_help = true)]
	Scrape(ScrapeArgs),
}

#[derive(Args, Debug)]
pub struct ScrapeArgs {
	/// `all`, or substrings of the account names to export
	#[arg(required = true, num_args = 1.., value_parser = NonEmptyStringValueParser::new())]
	pub accounts: Vec<String>,

	/// First day of the range
	#[arg(long, value_name = "DD.MM.YYYY")]
	pub from: String,

	/// Last day of the range
	#[arg(long, value_name = "DD.MM.YYYY")]
	pub to: String,

	/// Directory for diagnostic screenshots
	#[arg(short = 's', long = "screenshotDir", value_name = "DIR", default_value = "./screenshots")]
	pub screenshot_dir: PathBuf,

	/// Directory for exported results
	#[arg(short = 'o', long = "outputFolder", value_name = "DIR", default_value = "./output")]
	pub output_folder: PathBuf,

	/// Show the browser window
	#[arg(short = 'i', long = "interactive-mode")]
	pub interactive: bool,

	/// Store the portal's own export file instead of reading the result table
	#[arg(long)]
	pub download: bool,

	/// Also read the account balance
	#[arg(long)]
	pub balance: bool,

	/// JSON file overriding portal selectors and timing
	#[arg(long, value_name = "FILE")]
	pub portal_config: Option<PathBuf>,

	/// Browser executable (defaults to BANK_CHROME_PATH, then a search of common locations)
	#[arg(long, value_name = "PATH")]
	pub chrome: Option<PathBuf>,
}
