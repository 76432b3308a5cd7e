use clap::Parser;

use refguard::cli::Cli;
use refguard::commands;
use refguard::logging;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let code = tokio::select! {
        result = commands::run::execute(&cli) => match result {
            Ok(code) => code,
            Err(e) => {
                eprintln!("❌ Error: {e}");
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            // Dropping the sweep future aborts outstanding tasks mid-attempt;
            // nothing is partially persisted.
            eprintln!("\n⚠️  Validation interrupted by user");
            130
        }
    };
    std::process::exit(code);
}
