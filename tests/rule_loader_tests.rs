//! Rule loader behavior over realistic rules directories.

use pretty_assertions::assert_eq;
use refguard::error::DomainError;
use refguard::rules::{RuleLevel, RuleLoader};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A rules tree exercising every layer and both named-set document kinds.
fn sample_rules_dir() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    write(
        root,
        "base.yaml",
        r#"
- type: ColumnUnique
  column: MasterId
- type: ColumnNotNull
  column: MasterId
"#,
    );
    write(
        root,
        "stock/base.yaml",
        r#"
- type: ColumnNotNull
  column: Symbol
- type: ColumnMatchesRegex
  column: RIC
  regex: "[0-9]{4}\\.[A-Z]{2}"
"#,
    );
    write(
        root,
        "exchanges/xhkg.yaml",
        r#"
- type: ColumnNotNull
  column: Sedol
"#,
    );
    write(
        root,
        "stock/exchanges/xhkg/exchange.yaml",
        r#"
- type: ColumnMatchesRegex
  column: RIC
  regex: "[0-9]{4}\\.HK"
"#,
    );
    write(
        root,
        "stock/exchanges/xhkg/custom.yaml",
        r#"
status_checks:
  - type: ColumnInSet
    column: Status
    value_set: [Active, Inactive]
"#,
    );
    write(
        root,
        "custom.yaml",
        r#"
status_checks:
  - type: ColumnInSet
    column: Status
    value_set: [ACTIVE]
root_only:
  - type: ColumnNotNull
    column: Country
"#,
    );
    write(
        root,
        "stock/combined.yaml",
        r#"
is_tradable:
  include: [status_checks]
  extra_rules:
    - type: ColumnNotNull
      column: LotSize
cycle_a:
  include: [cycle_b]
cycle_b:
  include: [cycle_a]
"#,
    );
    write(root, "stock/custom.yaml", "# product custom sets live here\n");

    tmp
}

#[test]
fn layers_merge_in_override_order() {
    let tmp = sample_rules_dir();
    let loader = RuleLoader::new(tmp.path());

    let rules = loader.load_combined(Some("stock"), Some("XHKG"), None, None).unwrap();
    let levels: Vec<RuleLevel> = rules.iter().map(|r| r.level).collect();
    assert_eq!(
        levels,
        vec![
            RuleLevel::Base,
            RuleLevel::Base,
            RuleLevel::Product,
            RuleLevel::Product,
            RuleLevel::Exchange,
            RuleLevel::ProductExchange,
        ]
    );

    // Same (column, type) declared at base and product-exchange level: the
    // stricter exchange rule must appear after the base one.
    let regex_positions: Vec<usize> = rules
        .iter()
        .enumerate()
        .filter(|(_, r)| r.rule.kind == "ColumnMatchesRegex" && r.rule.column == "RIC")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(regex_positions.len(), 2);
    assert!(regex_positions[0] < regex_positions[1]);
    assert_eq!(rules[regex_positions[1]].rule.regex.as_deref(), Some("[0-9]{4}\\.HK"));
}

#[test]
fn two_loads_produce_identical_rule_lists() {
    let tmp = sample_rules_dir();
    let loader = RuleLoader::new(tmp.path());
    let names = vec!["is_tradable".to_string()];

    let first = loader
        .load_combined(Some("stock"), Some("XHKG"), Some(&names), None)
        .unwrap();
    let second = loader
        .load_combined(Some("stock"), Some("XHKG"), Some(&names), None)
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn exchange_scope_overrides_root_named_set() {
    let tmp = sample_rules_dir();
    let loader = RuleLoader::new(tmp.path());
    let names = vec!["status_checks".to_string()];

    // At (stock, XHKG) the exchange-level definition wins.
    let scoped = loader
        .load_custom_rules_from_yaml(&names, Some("stock"), Some("XHKG"))
        .unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].rule.value_set.as_ref().unwrap().len(), 2);
    assert!(scoped[0].source.contains("exchanges"));

    // Without a scope the root definition is used.
    let root = loader.load_custom_rules_from_yaml(&names, None, None).unwrap();
    assert_eq!(root[0].rule.value_set.as_ref().unwrap().len(), 1);
    assert_eq!(root[0].level, RuleLevel::Custom);
}

#[test]
fn includes_expand_depth_first_with_inline_rules_after() {
    let tmp = sample_rules_dir();
    let loader = RuleLoader::new(tmp.path());
    let names = vec!["is_tradable".to_string()];

    let rules = loader
        .load_custom_rules_from_yaml(&names, Some("stock"), Some("XHKG"))
        .unwrap();
    assert_eq!(rules.len(), 2);
    // Included set first (resolved at exchange scope), inline rule after.
    assert_eq!(rules[0].rule.column, "Status");
    assert_eq!(rules[0].set_name.as_deref(), Some("status_checks"));
    assert_eq!(rules[1].rule.column, "LotSize");
    assert_eq!(rules[1].level, RuleLevel::Combined);
    assert_eq!(rules[1].set_name.as_deref(), Some("is_tradable"));
}

#[test]
fn include_cycles_are_detected_with_their_chain() {
    let tmp = sample_rules_dir();
    let loader = RuleLoader::new(tmp.path());
    let names = vec!["cycle_a".to_string()];

    let err = loader
        .load_custom_rules_from_yaml(&names, Some("stock"), Some("XHKG"))
        .unwrap_err();
    match err {
        DomainError::CircularInclude { chain } => {
            assert_eq!(chain, vec!["cycle_a", "cycle_b", "cycle_a"]);
        }
        other => panic!("expected CircularInclude, got {other}"),
    }
}

#[test]
fn unknown_set_reports_available_names() {
    let tmp = sample_rules_dir();
    let loader = RuleLoader::new(tmp.path());
    let names = vec!["does_not_exist".to_string()];

    let err = loader
        .load_custom_rules_from_yaml(&names, Some("stock"), Some("XHKG"))
        .unwrap_err();
    match err {
        DomainError::RuleNotFound { name, available } => {
            assert_eq!(name, "does_not_exist");
            assert!(available.contains(&"status_checks".to_string()));
            assert!(available.contains(&"is_tradable".to_string()));
            assert!(available.contains(&"root_only".to_string()));
        }
        other => panic!("expected RuleNotFound, got {other}"),
    }
}

#[test]
fn catalogs_separate_custom_and_combined() {
    let tmp = sample_rules_dir();
    let loader = RuleLoader::new(tmp.path());

    let custom = loader.available_custom_rule_sets(Some("stock"), Some("XHKG"));
    assert!(custom.contains(&"status_checks".to_string()));
    assert!(custom.contains(&"root_only".to_string()));
    assert!(custom.contains(&"is_tradable".to_string()));

    let combined = loader.available_combined_rule_sets(Some("stock"), Some("XHKG"));
    assert!(combined.contains(&"is_tradable".to_string()));
    assert!(!combined.contains(&"root_only".to_string()));

    // Sorted output is part of the contract.
    let mut sorted = combined.clone();
    sorted.sort();
    assert_eq!(combined, sorted);
}

#[test]
fn missing_and_comment_only_files_are_empty() {
    let tmp = sample_rules_dir();
    let loader = RuleLoader::new(tmp.path());

    // stock/custom.yaml holds only comments; option/ has no files at all.
    assert!(loader.load_product_rules("option").unwrap().is_empty());
    assert!(loader.load_exchange_rules("XNYS").unwrap().is_empty());
    let rules = loader.load_combined(Some("option"), Some("XNYS"), None, None).unwrap();
    assert_eq!(rules.len(), 2); // global base only
}

#[test]
fn product_aliases_resolve_to_the_same_folder() {
    let tmp = sample_rules_dir();
    let loader = RuleLoader::new(tmp.path());

    let singular = loader.load_product_rules("stock").unwrap();
    let plural = loader.load_product_rules("stocks").unwrap();
    assert_eq!(singular, plural);
    assert_eq!(singular.len(), 2);
}

#[test]
fn exchange_lookup_is_case_insensitive() {
    let tmp = sample_rules_dir();
    let loader = RuleLoader::new(tmp.path());

    let upper = loader.load_exchange_rules("XHKG").unwrap();
    let lower = loader.load_exchange_rules("xhkg").unwrap();
    assert_eq!(upper, lower);
    assert_eq!(upper.len(), 1);
}

#[test]
fn reload_picks_up_changed_files() {
    let tmp = sample_rules_dir();
    let loader = RuleLoader::new(tmp.path());

    assert_eq!(loader.load_base_rules().unwrap().len(), 2);
    write(tmp.path(), "base.yaml", "- type: ColumnNotNull\n  column: MasterId\n");

    // Cached parse still serves the old document until an explicit reload.
    assert_eq!(loader.load_base_rules().unwrap().len(), 2);
    loader.reload();
    assert_eq!(loader.load_base_rules().unwrap().len(), 1);
}

#[test]
fn malformed_rule_document_is_an_invalid_rule() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "base.yaml", "just_a_string\n");
    let loader = RuleLoader::new(tmp.path());
    let err = loader.load_base_rules().unwrap_err();
    assert!(matches!(err, DomainError::InvalidRule(_)));
}

#[test]
fn legacy_per_file_custom_sets_still_resolve() {
    let tmp = sample_rules_dir();
    write(
        tmp.path(),
        "custom/legacy_set.yaml",
        "- type: ColumnNotNull\n  column: Isin\n",
    );
    let loader = RuleLoader::new(tmp.path());

    let names = vec!["legacy_set".to_string()];
    let rules = loader.load_custom_rules_from_yaml(&names, None, None).unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].rule.column, "Isin");
    assert!(loader
        .available_custom_rule_sets(None, None)
        .contains(&"legacy_set".to_string()));
}
