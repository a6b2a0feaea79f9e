//! Reference data store: the CSV replacement catalog, the Class 47 subclass
//! number table, and the per-pack `.dcsv` number catalogs.
//!
//! Swap rules and the Class 47 table are loaded eagerly; a missing or
//! unreadable table is fatal before any document is touched. Number catalogs
//! are resolved against the RailWorks assets directory on first use and
//! cached for the rest of the run. A missing or unparseable number catalog
//! is a configuration error, not a per-vehicle miss, so it aborts the whole
//! run with a pointer at the likely cause.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::RegexBuilder;
use tracing::debug;

use crate::numbering::Candidate;
use crate::scenario::{Document, Vehicle};

/// Header written when bootstrapping an absent user substitution table.
const USER_TABLE_HEADER: &str =
    "Label,Provider,Product,Blueprint,ReplaceProvider,ReplaceProduct,ReplaceBlueprint,ReplaceName,NumbersDcsv\n";

/// One row of the replacement catalog: a source-match triple and the
/// replacement identity it rewrites to.
#[derive(Debug, Clone)]
pub struct SwapRule {
    pub provider: String,
    pub product: String,
    pub blueprint: regex::Regex,
    pub replace_provider: String,
    pub replace_product: String,
    pub replace_blueprint: String,
    pub replace_name: String,
    /// Relative path of the number catalog for this rule, empty when the
    /// replacement keeps the source number.
    pub numbers_dcsv: String,
}

impl SwapRule {
    /// Source-identity match: provider and product are substring matches,
    /// blueprint is a case-insensitive regex over the full blueprint path.
    pub fn matches(&self, vehicle: &Vehicle) -> bool {
        vehicle.provider.contains(&self.provider)
            && vehicle.product.contains(&self.product)
            && self.blueprint.is_match(&vehicle.blueprint)
    }
}

/// Payload of one Class 47 table row: the display name and blueprint that go
/// with a specific running number.
#[derive(Debug, Clone)]
pub struct C47Loco {
    pub name: String,
    pub blueprint: String,
}

/// All reference data needed for one run.
#[derive(Debug)]
pub struct Catalog {
    railworks: PathBuf,
    rules: BTreeMap<String, Vec<SwapRule>>,
    user_rules: Vec<SwapRule>,
    c47_table: BTreeMap<String, Vec<Candidate<C47Loco>>>,
    dcsv_cache: RefCell<HashMap<PathBuf, Vec<String>>>,
}

impl Catalog {
    /// Load the replacement catalog, user table and Class 47 table from
    /// `tables_dir`. The user table is created with a bare header when
    /// absent; the other two are required.
    pub fn load(tables_dir: &Path, railworks: &Path) -> Result<Catalog> {
        let replacements = tables_dir.join("Replacements.csv");
        let user = tables_dir.join("User.csv");
        let c47 = tables_dir.join("Class47BRBlue_numbers.csv");

        ensure_user_table(&user)?;

        let rules = read_rules(&replacements)?;
        let user_rules = read_rules(&user)?
            .into_values()
            .flatten()
            .collect::<Vec<_>>();
        let c47_table = read_c47_table(&c47)?;
        debug!(
            families = rules.len(),
            user_rules = user_rules.len(),
            "reference tables loaded"
        );

        Ok(Catalog {
            railworks: railworks.to_path_buf(),
            rules,
            user_rules,
            c47_table,
            dcsv_cache: RefCell::new(HashMap::new()),
        })
    }

    /// Rules for one family label, in table order. Unknown labels yield an
    /// empty slice so a family with no rows simply never matches.
    pub fn rules(&self, family: &str) -> &[SwapRule] {
        self.rules.get(family).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The user-defined fallback rules, in table order.
    pub fn user_rules(&self) -> &[SwapRule] {
        &self.user_rules
    }

    /// Class 47 number table for one livery group key.
    pub fn c47_numbers(&self, group: &str) -> &[Candidate<C47Loco>] {
        self.c47_table.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Absolute path of an asset-relative file under the RailWorks folder.
    pub fn asset_path(&self, relative: &str) -> PathBuf {
        self.railworks.join(relative.replace('\\', "/"))
    }

    /// Running numbers of a `.dcsv` catalog, given its path relative to the
    /// RailWorks folder. Loaded once per run; a missing or unparseable
    /// catalog aborts the swap.
    pub fn dcsv_numbers(&self, relative: &str) -> Result<Vec<String>> {
        let path = self.asset_path(relative);
        if let Some(cached) = self.dcsv_cache.borrow().get(&path) {
            return Ok(cached.clone());
        }
        let numbers = read_dcsv(&path)?;
        self.dcsv_cache
            .borrow_mut()
            .insert(path, numbers.clone());
        Ok(numbers)
    }
}

/// Create the user substitution table with its header row if absent.
fn ensure_user_table(path: &Path) -> Result<()> {
    if path.is_file() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create tables directory {}", parent.display()))?;
    }
    fs::write(path, USER_TABLE_HEADER)
        .with_context(|| format!("cannot create user table {}", path.display()))
}

fn read_rules(path: &Path) -> Result<BTreeMap<String, Vec<SwapRule>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| {
            format!(
                "vehicle swap table {} not found; try re-installing",
                path.display()
            )
        })?;
    let mut rules: BTreeMap<String, Vec<SwapRule>> = BTreeMap::new();
    for (idx, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("bad row in swap table {}", path.display()))?;
        let field = |i: usize| record.get(i).unwrap_or("").to_string();
        let label = field(0);
        if label.is_empty() || label == "Label" {
            continue;
        }
        let blueprint = RegexBuilder::new(record.get(3).unwrap_or(""))
            .case_insensitive(true)
            .build()
            .with_context(|| {
                format!(
                    "bad blueprint pattern in {} row {}",
                    path.display(),
                    idx + 1
                )
            })?;
        rules.entry(label).or_default().push(SwapRule {
            provider: field(1),
            product: field(2),
            blueprint,
            replace_provider: field(4),
            replace_product: field(5),
            replace_blueprint: field(6),
            replace_name: field(7),
            numbers_dcsv: field(8),
        });
    }
    Ok(rules)
}

/// The Class 47 table holds rows of `Group,Number,Era,Key,Name,Blueprint`
/// ordered ascending by key within each group.
fn read_c47_table(path: &Path) -> Result<BTreeMap<String, Vec<Candidate<C47Loco>>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| {
            format!(
                "Class 47 number table {} not found; try re-installing",
                path.display()
            )
        })?;
    let mut table: BTreeMap<String, Vec<Candidate<C47Loco>>> = BTreeMap::new();
    for record in reader.records() {
        let record =
            record.with_context(|| format!("bad row in number table {}", path.display()))?;
        let field = |i: usize| record.get(i).unwrap_or("").to_string();
        let group = field(0);
        if group.is_empty() || group == "Label" {
            continue;
        }
        let Ok(key) = field(3).parse::<i64>() else {
            continue;
        };
        table.entry(group).or_default().push(Candidate {
            key,
            number: field(1),
            payload: C47Loco {
                name: field(4),
                blueprint: field(5),
            },
        });
    }
    Ok(table)
}

/// Pull the `CSVItem/cCSVItem/Name` entries out of a `.dcsv` catalog.
fn read_dcsv(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path).with_context(|| {
        format!(
            "vehicle number catalog {} not found; check that the required \
             packs are installed and the RailWorks folder is set correctly",
            path.display()
        )
    })?;
    let doc = Document::parse(&text)
        .with_context(|| format!("vehicle number catalog {} could not be parsed", path.display()))?;
    Ok(doc
        .root
        .find_all("CSVItem/cCSVItem/Name")
        .iter()
        .map(|e| e.text())
        .filter(|t| !t.is_empty())
        .collect())
}
