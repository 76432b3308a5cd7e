//! Loads validation rules from the layered YAML rules directory.
//!
//! Directory layout (every file optional; missing files are empty, not
//! errors):
//!
//! ```text
//! base.yaml                              global base rules
//! combined.yaml                          global combined sets
//! custom.yaml                            global custom sets
//! exchanges/<ex>.yaml                    root exchange rules
//! <product>/base.yaml                    product base
//! <product>/combined.yaml                product combined sets
//! <product>/custom.yaml                  product custom sets
//! <product>/exchanges/<ex>/exchange.yaml product x exchange rules
//! <product>/exchanges/<ex>/combined.yaml product x exchange combined sets
//! <product>/exchanges/<ex>/custom.yaml   product x exchange custom sets
//! ```
//!
//! Parsed documents are cached per absolute path under a mutex so concurrent
//! first-time reads do not tear; `reload` drops the cache.

use serde_yaml::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{DomainError, DomainResult};
use crate::rules::model::{normalize_product_type, Rule, RuleLevel, ScopedRule};

pub struct RuleLoader {
    rules_dir: PathBuf,
    cache: Mutex<HashMap<PathBuf, Arc<Value>>>,
}

/// A named set located somewhere in the lookup chain.
struct NamedSetHit {
    value: Value,
    source: String,
    combined: bool,
}

impl RuleLoader {
    pub fn new(rules_dir: impl Into<PathBuf>) -> Self {
        Self { rules_dir: rules_dir.into(), cache: Mutex::new(HashMap::new()) }
    }

    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Drop every cached parse; the next read goes back to disk.
    pub fn reload(&self) {
        self.cache.lock().expect("rule cache poisoned").clear();
    }

    // ------------------------------------------------------------------
    // Layer loading
    // ------------------------------------------------------------------

    /// Global base rules applying to every exchange.
    pub fn load_base_rules(&self) -> DomainResult<Vec<ScopedRule>> {
        self.load_list_file(&self.rules_dir.join("base.yaml"), RuleLevel::Base)
    }

    /// Product-level base rules, e.g. `stock/base.yaml`.
    pub fn load_product_rules(&self, product_type: &str) -> DomainResult<Vec<ScopedRule>> {
        let product = normalize_product_type(product_type);
        self.load_list_file(&self.rules_dir.join(&product).join("base.yaml"), RuleLevel::Product)
    }

    /// Root exchange rules, e.g. `exchanges/xhkg.yaml`.
    pub fn load_exchange_rules(&self, exchange: &str) -> DomainResult<Vec<ScopedRule>> {
        let file = self.rules_dir.join("exchanges").join(format!("{}.yaml", exchange.to_lowercase()));
        self.load_list_file(&file, RuleLevel::Exchange)
    }

    /// Product x exchange rules, e.g. `stock/exchanges/xhkg/exchange.yaml`,
    /// with the legacy flat `stock/exchanges/xhkg.yaml` as fallback.
    pub fn load_product_exchange_rules(
        &self,
        product_type: &str,
        exchange: &str,
    ) -> DomainResult<Vec<ScopedRule>> {
        let product = normalize_product_type(product_type);
        let ex = exchange.to_lowercase();
        let file = self.rules_dir.join(&product).join("exchanges").join(&ex).join("exchange.yaml");
        if file.exists() {
            return self.load_list_file(&file, RuleLevel::ProductExchange);
        }
        let legacy = self.rules_dir.join(&product).join("exchanges").join(format!("{ex}.yaml"));
        self.load_list_file(&legacy, RuleLevel::ProductExchange)
    }

    /// Merge every applicable layer in override order:
    /// base -> product base -> root exchange -> product x exchange ->
    /// named sets -> inline rules. Duplicates are preserved; later rules
    /// appear after earlier ones.
    pub fn load_combined(
        &self,
        product_type: Option<&str>,
        exchange: Option<&str>,
        custom_rule_names: Option<&[String]>,
        inline_rules: Option<&[Rule]>,
    ) -> DomainResult<Vec<ScopedRule>> {
        let mut rules = self.load_base_rules()?;

        if let Some(product) = product_type {
            rules.extend(self.load_product_rules(product)?);
        }
        if let Some(ex) = exchange {
            rules.extend(self.load_exchange_rules(ex)?);
        }
        if let (Some(product), Some(ex)) = (product_type, exchange) {
            rules.extend(self.load_product_exchange_rules(product, ex)?);
        }
        if let Some(names) = custom_rule_names {
            rules.extend(self.load_custom_rules_from_yaml(names, product_type, exchange)?);
        }
        if let Some(inline) = inline_rules {
            rules.extend(
                inline
                    .iter()
                    .cloned()
                    .map(|r| ScopedRule::new(r, RuleLevel::Custom, "inline")),
            );
        }

        tracing::debug!(
            product = product_type.unwrap_or("-"),
            exchange = exchange.unwrap_or("-"),
            count = rules.len(),
            "combined rules loaded"
        );
        Ok(rules)
    }

    /// Resolve a list of named sets, in order, each with a fresh include
    /// path.
    pub fn load_custom_rules_from_yaml(
        &self,
        names: &[String],
        product_type: Option<&str>,
        exchange: Option<&str>,
    ) -> DomainResult<Vec<ScopedRule>> {
        let mut rules = Vec::new();
        for name in names {
            let mut chain = Vec::new();
            rules.extend(self.resolve_named_set(name, product_type, exchange, &mut chain)?);
        }
        Ok(rules)
    }

    // ------------------------------------------------------------------
    // Catalogs
    // ------------------------------------------------------------------

    /// Names of every custom or combined set visible at this scope, sorted.
    pub fn available_custom_rule_sets(
        &self,
        product_type: Option<&str>,
        exchange: Option<&str>,
    ) -> Vec<String> {
        let mut names = Vec::new();
        for (path, _) in self.named_set_files(product_type, exchange) {
            names.extend(self.mapping_keys(&path));
        }
        names.extend(self.legacy_set_names("custom/*.yaml"));
        names.extend(self.legacy_set_names("custom/combined/*.yaml"));
        names.sort();
        names.dedup();
        names
    }

    /// Names defined in `combined.yaml` documents only, sorted.
    pub fn available_combined_rule_sets(
        &self,
        product_type: Option<&str>,
        exchange: Option<&str>,
    ) -> Vec<String> {
        let mut names = Vec::new();
        for (path, combined) in self.named_set_files(product_type, exchange) {
            if combined {
                names.extend(self.mapping_keys(&path));
            }
        }
        names.extend(self.legacy_set_names("custom/combined/*.yaml"));
        names.sort();
        names.dedup();
        names
    }

    /// Combined-set names defined at the product x exchange scope only.
    pub fn exchange_combined_names(&self, product_type: &str, exchange: &str) -> Vec<String> {
        let path = self
            .rules_dir
            .join(normalize_product_type(product_type))
            .join("exchanges")
            .join(exchange.to_lowercase())
            .join("combined.yaml");
        let mut names = self.mapping_keys(&path);
        names.sort();
        names
    }

    /// The raw definition of a named set and its direct include list, for
    /// catalog detail endpoints. Returns `None` when the set does not exist.
    pub fn named_set_definition(
        &self,
        name: &str,
        product_type: Option<&str>,
        exchange: Option<&str>,
    ) -> DomainResult<Option<(Value, Vec<String>)>> {
        let Some(hit) = self.find_named_set(name, product_type, exchange)? else {
            return Ok(None);
        };
        let includes = match &hit.value {
            Value::Mapping(map) => map
                .iter()
                .find(|(k, _)| k.as_str() == Some("include"))
                .map(|(_, v)| include_names(v))
                .transpose()?
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        Ok(Some((hit.value, includes)))
    }

    // ------------------------------------------------------------------
    // Named-set resolution
    // ------------------------------------------------------------------

    fn resolve_named_set(
        &self,
        name: &str,
        product_type: Option<&str>,
        exchange: Option<&str>,
        chain: &mut Vec<String>,
    ) -> DomainResult<Vec<ScopedRule>> {
        if chain.iter().any(|seen| seen == name) {
            let mut cycle = chain.clone();
            cycle.push(name.to_string());
            return Err(DomainError::CircularInclude { chain: cycle });
        }
        chain.push(name.to_string());

        let hit = self.find_named_set(name, product_type, exchange)?.ok_or_else(|| {
            DomainError::RuleNotFound {
                name: name.to_string(),
                available: self.available_custom_rule_sets(product_type, exchange),
            }
        })?;
        let level = if hit.combined { RuleLevel::Combined } else { RuleLevel::Custom };

        let mut rules = Vec::new();
        match &hit.value {
            Value::Sequence(items) => {
                rules.extend(self.rules_from_items(items, level, &hit.source, Some(name))?);
            }
            Value::Mapping(map) => {
                // Included sets expand first, depth-first and left-to-right;
                // inline rules in the same document follow.
                if let Some((_, inc)) = map.iter().find(|(k, _)| k.as_str() == Some("include")) {
                    for included in include_names(inc)? {
                        rules.extend(self.resolve_named_set(
                            &included,
                            product_type,
                            exchange,
                            chain,
                        )?);
                    }
                }
                for (key, value) in map.iter() {
                    if key.as_str() == Some("include") {
                        continue;
                    }
                    match value {
                        Value::Sequence(items) => {
                            rules.extend(self.rules_from_items(items, level, &hit.source, Some(name))?);
                        }
                        Value::Mapping(m) if m.iter().any(|(k, _)| k.as_str() == Some("type")) => {
                            let rule = parse_rule(value, &hit.source)?;
                            rules.push(ScopedRule::new(rule, level, hit.source.clone()).named(name));
                        }
                        _ => {
                            return Err(DomainError::InvalidRule(format!(
                                "set '{}' in {}: entry '{}' is neither a rule list nor a rule",
                                name,
                                hit.source,
                                key.as_str().unwrap_or("?")
                            )));
                        }
                    }
                }
            }
            _ => {
                return Err(DomainError::InvalidRule(format!(
                    "set '{}' in {} must be a list of rules or a mapping with an 'include' key",
                    name, hit.source
                )));
            }
        }

        chain.pop();
        Ok(rules)
    }

    /// Walk the lookup chain, most specific scope first; first hit wins.
    fn find_named_set(
        &self,
        name: &str,
        product_type: Option<&str>,
        exchange: Option<&str>,
    ) -> DomainResult<Option<NamedSetHit>> {
        for (path, combined) in self.named_set_files(product_type, exchange) {
            if let Some(doc) = self.read_yaml(&path)? {
                if let Value::Mapping(map) = doc.as_ref() {
                    if let Some((_, v)) = map.iter().find(|(k, _)| k.as_str() == Some(name)) {
                        return Ok(Some(NamedSetHit {
                            value: v.clone(),
                            source: self.rel(&path),
                            combined,
                        }));
                    }
                }
            }
        }

        // Legacy per-file layouts: custom/<name>.yaml, custom/combined/<name>.yaml
        let legacy = self.rules_dir.join("custom").join(format!("{name}.yaml"));
        if let Some(doc) = self.read_yaml(&legacy)? {
            return Ok(Some(NamedSetHit {
                value: doc.as_ref().clone(),
                source: self.rel(&legacy),
                combined: false,
            }));
        }
        let legacy_combined =
            self.rules_dir.join("custom").join("combined").join(format!("{name}.yaml"));
        if let Some(doc) = self.read_yaml(&legacy_combined)? {
            return Ok(Some(NamedSetHit {
                value: doc.as_ref().clone(),
                source: self.rel(&legacy_combined),
                combined: true,
            }));
        }

        Ok(None)
    }

    /// Candidate named-set files for a scope, in lookup order. The `bool`
    /// marks combined documents.
    fn named_set_files(
        &self,
        product_type: Option<&str>,
        exchange: Option<&str>,
    ) -> Vec<(PathBuf, bool)> {
        let mut files = Vec::new();
        if let (Some(product), Some(ex)) = (product_type, exchange) {
            let scope = self
                .rules_dir
                .join(normalize_product_type(product))
                .join("exchanges")
                .join(ex.to_lowercase());
            files.push((scope.join("custom.yaml"), false));
            files.push((scope.join("combined.yaml"), true));
        }
        if let Some(product) = product_type {
            let scope = self.rules_dir.join(normalize_product_type(product));
            files.push((scope.join("custom.yaml"), false));
            files.push((scope.join("combined.yaml"), true));
        }
        files.push((self.rules_dir.join("custom.yaml"), false));
        files.push((self.rules_dir.join("combined.yaml"), true));
        files
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Parse one YAML file, consulting the process-wide cache first.
    /// Missing files return `None`; comments-only files parse to null and
    /// are treated as empty by callers.
    fn read_yaml(&self, path: &Path) -> DomainResult<Option<Arc<Value>>> {
        if !path.exists() {
            return Ok(None);
        }
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if let Some(doc) = self.cache.lock().expect("rule cache poisoned").get(&key) {
            return Ok(Some(doc.clone()));
        }

        let raw = std::fs::read_to_string(path)?;
        let doc: Value = serde_yaml::from_str(&raw).map_err(|e| {
            DomainError::InvalidRule(format!("YAML error in {}: {e}", self.rel(path)))
        })?;
        let doc = Arc::new(doc);
        self.cache.lock().expect("rule cache poisoned").insert(key, doc.clone());
        Ok(Some(doc))
    }

    fn load_list_file(&self, path: &Path, level: RuleLevel) -> DomainResult<Vec<ScopedRule>> {
        let Some(doc) = self.read_yaml(path)? else {
            return Ok(Vec::new());
        };
        match doc.as_ref() {
            Value::Null => Ok(Vec::new()),
            Value::Sequence(items) => self.rules_from_items(items, level, &self.rel(path), None),
            _ => Err(DomainError::InvalidRule(format!(
                "{} must contain a list of rules",
                self.rel(path)
            ))),
        }
    }

    fn rules_from_items(
        &self,
        items: &[Value],
        level: RuleLevel,
        source: &str,
        set_name: Option<&str>,
    ) -> DomainResult<Vec<ScopedRule>> {
        items
            .iter()
            .map(|item| {
                let rule = parse_rule(item, source)?;
                let mut scoped = ScopedRule::new(rule, level, source);
                if let Some(name) = set_name {
                    scoped = scoped.named(name);
                }
                Ok(scoped)
            })
            .collect()
    }

    fn mapping_keys(&self, path: &Path) -> Vec<String> {
        match self.read_yaml(path) {
            Ok(Some(doc)) => match doc.as_ref() {
                Value::Mapping(map) => {
                    map.iter().filter_map(|(k, _)| k.as_str().map(String::from)).collect()
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn legacy_set_names(&self, pattern: &str) -> Vec<String> {
        let full = self.rules_dir.join(pattern);
        glob::glob(&full.to_string_lossy())
            .map(|paths| {
                paths
                    .filter_map(Result::ok)
                    .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn rel(&self, path: &Path) -> String {
        path.strip_prefix(&self.rules_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }
}

/// Deserialize one rule entry, with file context on failure.
fn parse_rule(value: &Value, source: &str) -> DomainResult<Rule> {
    let rule: Rule = serde_yaml::from_value(value.clone())
        .map_err(|e| DomainError::InvalidRule(format!("{source}: {e}")))?;
    if rule.column.trim().is_empty() {
        return Err(DomainError::InvalidRule(format!(
            "{source}: rule of type '{}' has an empty column",
            rule.kind
        )));
    }
    Ok(rule)
}

/// An `include` value is a single name or a list of names.
fn include_names(value: &Value) -> DomainResult<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Sequence(items) => items
            .iter()
            .map(|v| {
                v.as_str().map(String::from).ok_or_else(|| {
                    DomainError::InvalidRule("include entries must be strings".to_string())
                })
            })
            .collect(),
        _ => Err(DomainError::InvalidRule(
            "include must be a string or a list of strings".to_string(),
        )),
    }
}
