//! Service-layer flows over a real CSV data folder and rules directory.

use pretty_assertions::assert_eq;
use refguard::config::AppConfig;
use refguard::error::DomainError;
use refguard::loaders::{CsvDataLoader, DataLoader};
use refguard::rules::RuleLoader;
use refguard::services::{InstrumentService, ValidationService};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

struct Fixture {
    _tmp: TempDir,
    config: Arc<AppConfig>,
    loader: Arc<dyn DataLoader>,
    rules: Arc<RuleLoader>,
}

impl Fixture {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();

        write(
            root,
            "data/stocks/db_hkg.csv",
            "MasterId,RIC,Sedol,Exchange,Status,LotSize\n\
             HK0001,0005.HK,6158163,XHKG,Active,400\n\
             HK0002,0388.HK,6267359,XHKG,Halted,100\n\
             HK0003,0941.HK,,XHKG,Active,500\n",
        );
        write(
            root,
            "data/stocks/db_tks.csv",
            "MasterId,RIC,Sedol,Exchange,Status,LotSize\n\
             JP0001,7203.T,6900643,XTKS,Active,100\n",
        );

        write(
            root,
            "rules/base.yaml",
            "- type: ColumnUnique\n  column: MasterId\n- type: ColumnNotNull\n  column: MasterId\n",
        );
        write(
            root,
            "rules/stock/exchanges/xhkg/exchange.yaml",
            "- type: ColumnMatchesRegex\n  column: RIC\n  regex: \"[0-9]{4}\\\\.HK\"\n",
        );
        write(
            root,
            "rules/stock/custom.yaml",
            "status_validation:\n  - type: ColumnInSet\n    column: Status\n    value_set: [Active, Suspended]\n",
        );
        write(
            root,
            "rules/stock/combined.yaml",
            "is_tradable:\n  include: [status_validation]\n  extra_rules:\n    - type: ColumnNotNull\n      column: LotSize\n",
        );

        let config_json = format!(
            r#"{{
                "data_loader": {{
                    "type": "csv",
                    "csv": {{
                        "data_folder": "{data}",
                        "cache_ttl_seconds": 300,
                        "exchange_map": {{
                            "stock": {{
                                "apac": {{
                                    "XHKG": "stocks/db_hkg.csv",
                                    "XTKS": "stocks/db_tks.csv"
                                }}
                            }}
                        }}
                    }}
                }},
                "rules": {{"rules_dir": "{rules}"}}
            }}"#,
            data = root.join("data").display(),
            rules = root.join("rules").display(),
        );
        let config = Arc::new(AppConfig::from_json_str(&config_json).unwrap());
        let loader: Arc<dyn DataLoader> = Arc::new(CsvDataLoader::from_config(&config));
        let rules = Arc::new(RuleLoader::new(root.join("rules")));

        Self { _tmp: tmp, config, loader, rules }
    }

    fn validation(&self) -> ValidationService {
        ValidationService::new(self.loader.clone(), self.rules.clone(), self.config.clone())
    }

    fn instruments(&self) -> InstrumentService {
        InstrumentService::new(self.loader.clone(), self.config.clone())
    }
}

#[tokio::test]
async fn layered_validation_reports_exchange_label() {
    let fx = Fixture::new();
    let report = fx.validation().validate_exchange("stocks", "XHKG", None, None).await.unwrap();

    assert!(report.success);
    assert_eq!(report.product_type, "stock");
    assert_eq!(report.total, 3);
    assert_eq!(report.rules_applied_label, "exchange");
    assert_eq!(report.rules_applied.len(), 3);
}

#[tokio::test]
async fn custom_only_validation_fails_on_bad_status() {
    let fx = Fixture::new();
    let names = vec!["status_validation".to_string()];
    let report = fx
        .validation()
        .validate_custom_only("stock", "XHKG", Some(&names), None)
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.rules_applied_label, "custom");
    assert_eq!(report.total, 1);
    let result = &report.results[0];
    assert_eq!(result.unexpected_count, 1);
    assert_eq!(result.partial_unexpected[0].value, "Halted");
}

#[tokio::test]
async fn combined_set_resolution_drives_the_label() {
    let fx = Fixture::new();
    let names = vec!["is_tradable".to_string()];
    let report = fx
        .validation()
        .validate_custom_only("stock", "XHKG", Some(&names), None)
        .await
        .unwrap();

    assert_eq!(report.rules_applied_label, "combined");
    assert_eq!(report.total, 2); // included set + inline LotSize rule
}

#[tokio::test]
async fn custom_only_without_rules_is_rejected() {
    let fx = Fixture::new();
    let err = fx
        .validation()
        .validate_custom_only("stock", "XHKG", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidRequest(_)));
}

#[tokio::test]
async fn unknown_exchange_is_a_404_shaped_error() {
    let fx = Fixture::new();
    let err = fx.validation().validate_exchange("stock", "XLON", None, None).await.unwrap_err();
    match err {
        DomainError::ExchangeNotFound { exchange, available } => {
            assert_eq!(exchange, "XLON");
            assert_eq!(available, vec!["XHKG".to_string(), "XTKS".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn rules_preview_matches_validation_inputs() {
    let fx = Fixture::new();
    let names = vec!["is_tradable".to_string()];
    let rules = fx.validation().rules_for_exchange("stock", "XHKG", Some(&names)).unwrap();
    assert_eq!(rules.len(), 5); // 2 base + 1 exchange + 2 from the named set

    let catalog = fx.validation().combined_rule_names("stock", Some("XHKG"));
    assert_eq!(catalog["all_combined_rule_names"][0], "is_tradable");

    let details = fx.validation().combined_rule_details("stock", Some("XHKG")).unwrap();
    let detail = &details["combined_rules"][0];
    assert_eq!(detail["name"], "is_tradable");
    assert_eq!(detail["includes"][0], "status_validation");
    assert_eq!(detail["resolved_rule_count"], 2);
    assert_eq!(detail["full_rule_set_count"], 5);
}

#[tokio::test]
async fn validate_by_masterid_locates_exchange_from_the_record() {
    let fx = Fixture::new();
    let result = fx
        .validation()
        .validate_record_by_masterid("JP0001", "is_tradable", "stock")
        .await
        .unwrap();

    assert_eq!(result["exchange"], "XTKS");
    assert_eq!(result["master_id"], "JP0001");
    assert_eq!(result["combined_rule_name"], "is_tradable");
    assert_eq!(result["record"]["RIC"], "7203.T");
    assert_eq!(result["success"], true);
}

#[tokio::test]
async fn validate_by_masterid_rejects_unknown_rule_and_record() {
    let fx = Fixture::new();
    let err = fx
        .validation()
        .validate_record_by_masterid("HK0001", "no_such_set", "stock")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::RuleNotFound { .. }));

    let err = fx
        .validation()
        .validate_record_by_masterid("ZZ9999", "is_tradable", "stock")
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::RecordNotFound(_)));
}

#[tokio::test]
async fn ric_lookup_scans_all_exchanges_when_none_given() {
    let fx = Fixture::new();
    let records = fx.instruments().find_by_ric("stock", "7203.T", None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["Exchange"], "XTKS");

    let none = fx.instruments().find_by_ric("stock", "0000.XX", None).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn column_filter_projects_and_honors_missing_flag() {
    let fx = Fixture::new();
    let service = fx.instruments();

    // No values, missing=false: empty by definition.
    let empty = service
        .filter_by_column_values("stock", "XHKG", "Sedol", &[], false)
        .await
        .unwrap();
    assert!(empty.is_empty());

    // missing=true surfaces the row with the blank Sedol.
    let missing = service
        .filter_by_column_values("stock", "XHKG", "Sedol", &[], true)
        .await
        .unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0]["MasterId"], "HK0003");
    assert_eq!(missing[0].len(), 4);
    for key in ["MasterId", "RIC", "Sedol", "Exchange"] {
        assert!(missing[0].contains_key(key), "missing projected column {key}");
    }

    // Value match projects the filter column in as well.
    let matched = service
        .filter_by_column_values("stock", "XHKG", "Status", &["Halted".to_string()], false)
        .await
        .unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0]["MasterId"], "HK0002");
    assert!(matched[0].contains_key("Status"));
}

#[tokio::test]
async fn exchange_listing_paginates() {
    let fx = Fixture::new();
    let page = fx
        .instruments()
        .get_by_exchange("stock", "XHKG", Some(1), Some(1))
        .await
        .unwrap();
    assert_eq!(page["count"], 1);
    assert_eq!(page["instruments"][0]["MasterId"], "HK0002");
}
