use clap::Parser;

/// Root CLI parser for the `refguard` batch generator.
///
/// Sweeps every configured exchange of one or more regions through the
/// validation API and optionally persists each run to the database.
#[derive(Parser, Debug)]
#[command(name = "refguard")]
#[command(
    about = "Reference-data validation batch generator",
    long_about = "Runs layered data-quality validation for every configured \
                  (product, exchange) pair of the given region(s) against the \
                  refguard API, aggregates a per-region summary, and can \
                  persist each run for longitudinal analytics."
)]
pub struct Cli {
    /// Region(s) to validate: a single region (apac) or a comma-separated
    /// list (apac,emea,us).
    pub regions: Option<String>,

    /// Comma-separated custom rule set names to apply on top of the
    /// layered hierarchy.
    #[arg(long)]
    pub custom_rules: Option<String>,

    /// Base URL of the validation API (defaults to the configured value).
    #[arg(long)]
    pub api_url: Option<String>,

    /// Path to regions.yaml (defaults to the configured value).
    #[arg(long)]
    pub config: Option<String>,

    /// Environment token: dev, uat, or prod.
    #[arg(long)]
    pub env: Option<String>,

    /// List available regions and exit.
    #[arg(long)]
    pub list_regions: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Persist validation results to the database.
    #[arg(long)]
    pub save_to_database: bool,

    /// Database connection string (overrides configuration).
    #[arg(long)]
    pub database_connection: Option<String>,

    /// Concurrent exchange validations per region (0 = configured default).
    #[arg(long, default_value_t = 0)]
    pub workers: usize,
}

impl Cli {
    pub fn region_list(&self) -> Vec<String> {
        self.regions
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn custom_rule_names(&self) -> Option<Vec<String>> {
        self.custom_rules.as_deref().map(|raw| {
            raw.split(',').map(str::trim).filter(|r| !r.is_empty()).map(String::from).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn region_list_splits_and_trims() {
        let cli = Cli::parse_from(["refguard", "apac, emea ,,us"]);
        assert_eq!(cli.region_list(), vec!["apac", "emea", "us"]);
    }

    #[test]
    fn custom_rules_parse_to_names() {
        let cli = Cli::parse_from(["refguard", "apac", "--custom-rules", "is_tradable, status"]);
        assert_eq!(
            cli.custom_rule_names(),
            Some(vec!["is_tradable".to_string(), "status".to_string()])
        );
    }
}
