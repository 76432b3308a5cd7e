use std::sync::Arc;

use crate::batch::{ApiClient, BatchValidator, RegionsConfig, ValidationSummary};
use crate::cli::Cli;
use crate::commands::regions::list_regions;
use crate::config::AppConfig;
use crate::persistence::{RunStore, ValidationRepository};

/// Execute the batch CLI. Returns the process exit code:
/// 0 all passed, 1 at least one failure (interrupts are handled in main).
pub async fn execute(cli: &Cli) -> anyhow::Result<i32> {
    let config = AppConfig::load(cli.env.as_deref())?;
    let regions_path =
        cli.config.clone().unwrap_or_else(|| config.batch.regions_file.clone());
    let regions = RegionsConfig::load(&regions_path)?;

    if cli.list_regions {
        list_regions(&regions);
        return Ok(0);
    }

    let requested = cli.region_list();
    if requested.is_empty() {
        eprintln!("❌ Error: Region is required");
        eprintln!("Available regions: {}", regions.regions().join(", "));
        return Ok(1);
    }

    let invalid: Vec<&String> =
        requested.iter().filter(|r| !regions.contains(r)).collect();
    if !invalid.is_empty() {
        eprintln!(
            "❌ Error: Invalid region(s): {}",
            invalid.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        );
        eprintln!("Available regions: {}", regions.regions().join(", "));
        return Ok(1);
    }

    let api_url = cli.api_url.clone().unwrap_or_else(|| config.api.base_url.clone());
    let client = ApiClient::new(&api_url);

    let repository = if cli.save_to_database {
        println!("\n🗄️  Database saving is ENABLED");
        let conn = match cli.database_connection.as_deref() {
            Some(conn) => conn.to_string(),
            None => config
                .default_connection_string()
                .ok_or_else(|| anyhow::anyhow!("no database connection string configured"))?
                .to_string(),
        };
        let repo = ValidationRepository::connect(&conn).await?;
        if !repo.test_connection().await {
            println!("⚠️  Warning: database connection test failed; results may not be saved");
        }
        Some(Arc::new(repo))
    } else {
        println!("\n🗄️  Database saving is DISABLED (use --save-to-database to enable)");
        None
    };

    let workers = if cli.workers > 0 { cli.workers } else { config.batch.workers_per_region };
    let store = repository.clone().map(|r| r as Arc<dyn RunStore>);
    let validator = BatchValidator::new(regions, client, store, workers);
    let custom_rule_names = cli.custom_rule_names();

    let mut total_successful = 0;
    let mut total_failed = 0;
    let mut api_down = false;

    for region in &requested {
        println!("\n{}", "=".repeat(60));
        println!("Processing Region: {}", region.to_uppercase());
        println!("{}\n", "=".repeat(60));

        let summary = validator.validate_region(region, custom_rule_names.as_deref()).await;
        if summary.error.is_some() {
            api_down = true;
        }
        print_summary(&summary);
        total_successful += summary.successful;
        total_failed += summary.failed;
    }

    if let Some(repo) = repository {
        repo.close().await;
    }

    println!("\n{}", "=".repeat(60));
    println!("OVERALL SUMMARY");
    println!("{}", "=".repeat(60));
    println!("  Regions Processed: {}", requested.len());
    println!("  Total Successful: {total_successful}");
    println!("  Total Failed: {total_failed}");
    println!("  Total Validations: {}", total_successful + total_failed);

    if api_down || total_failed > 0 {
        println!("\n❌ {total_failed} validation(s) failed across {} region(s)", requested.len());
        Ok(1)
    } else {
        println!("\n✅ All validations passed!");
        Ok(0)
    }
}

fn print_summary(summary: &ValidationSummary) {
    if let Some(error) = &summary.error {
        println!("❌ ERROR: {error}");
        return;
    }

    for outcome in &summary.results {
        let marker = if outcome.success { "✅" } else { "❌" };
        let mut line = format!(
            "{marker} {} / {} ({} ms)",
            outcome.product_type.to_uppercase(),
            outcome.exchange,
            outcome.duration_ms
        );
        if let Some(run_id) = outcome.run_id {
            line.push_str(&format!(" [RunId: {run_id}]"));
        }
        println!("{line}");
        if let Some(error) = &outcome.error {
            println!("   {error}");
        }
    }

    println!(
        "\nRegion {}: {} successful, {} failed of {}",
        summary.region.to_uppercase(),
        summary.successful,
        summary.failed,
        summary.total
    );

    let saved = summary.saved_run_ids();
    if !saved.is_empty() {
        println!(
            "💾 Saved {} run(s): {}",
            saved.len(),
            saved.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
        );
    }
}
