//! Migration plan synthesis.
//!
//! Turns per-table diffs into an ordered [`MigrationPlan`]: one step per
//! changed table, referenced tables before referencing ones, each with a
//! fresh identifier, a readable name and a reversible body.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::config::{GeneratorConfig, IdentifierConvention};
use crate::differ::{ColumnDiff, IndexDiff, SchemaDiff};
use crate::error::{GenerationError, Result};
use crate::operations::{MigrationBody, MigrationOp};

/// Name used when nothing readable can be derived.
const FALLBACK_NAME: &str = "migration";

/// Identifier of one migration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MigrationId {
    value: u64,
    convention: IdentifierConvention,
}

impl MigrationId {
    /// Creates an identifier.
    #[must_use]
    pub const fn new(value: u64, convention: IdentifierConvention) -> Self {
        Self { value, convention }
    }

    /// Numeric value of the identifier.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }
}

impl fmt::Display for MigrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.convention {
            IdentifierConvention::Timestamp => write!(f, "{:014}", self.value),
            IdentifierConvention::Sequential => write!(f, "{:03}", self.value),
        }
    }
}

impl Serialize for MigrationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Extracts the numeric identifier from an identifier or a migration file
/// name such as `20240101120000_create_users.sql`.
#[must_use]
pub fn parse_identifier(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let rest = &raw[digits.len()..];
    if !(rest.is_empty() || rest.starts_with('_') || rest.starts_with('.')) {
        return None;
    }
    digits.parse().ok()
}

/// One migration of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStep {
    /// Entity owning the changed table.
    pub entity: String,
    /// Changed table.
    pub table: String,
    /// Identifier, unique across the run and the ledger.
    pub identifier: MigrationId,
    /// Readable, filesystem-safe name.
    pub name: String,
    /// `<identifier>_<name>.<extension>`.
    pub file_name: String,
    /// Forward and backward operations.
    pub body: MigrationBody,
}

/// Ordered migration steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    /// Steps in application order.
    pub steps: Vec<MigrationStep>,
}

impl MigrationPlan {
    /// Returns `true` when nothing needs to change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Steps in application order.
    pub fn iter(&self) -> std::slice::Iter<'_, MigrationStep> {
        self.steps.iter()
    }

    /// The step for one entity, if its table changes.
    #[must_use]
    pub fn step(&self, entity: &str) -> Option<&MigrationStep> {
        self.steps.iter().find(|s| s.entity == entity)
    }

    /// Steps in the order their `down` bodies must run.
    pub fn rollback_order(&self) -> impl Iterator<Item = &MigrationStep> {
        self.steps.iter().rev()
    }
}

impl<'a> IntoIterator for &'a MigrationPlan {
    type Item = &'a MigrationStep;
    type IntoIter = std::slice::Iter<'a, MigrationStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// One table's diff with the root entities it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTable {
    /// Diff of the table.
    pub diff: SchemaDiff,
    /// Root entities whose tables this one references.
    pub references: BTreeSet<String>,
}

/// Builds plans from diffs.
#[derive(Debug)]
pub struct MigrationSynthesizer<'c> {
    config: &'c GeneratorConfig,
}

impl<'c> MigrationSynthesizer<'c> {
    /// Creates a synthesizer for one run.
    #[must_use]
    pub const fn new(config: &'c GeneratorConfig) -> Self {
        Self { config }
    }

    /// Orders the tables, skips unchanged ones and emits one step for each
    /// of the rest.
    ///
    /// `known` holds the identifiers already on disk; `now` seeds timestamp
    /// identifiers.
    ///
    /// # Errors
    ///
    /// `DependencyCycle` when references loop, `IdentifierCollision` if an
    /// identifier would repeat.
    pub fn synthesize(
        &self,
        tables: &[PlannedTable],
        known: &[String],
        now: NaiveDateTime,
    ) -> Result<MigrationPlan> {
        let order = dependency_order(tables)?;
        let changed: Vec<&PlannedTable> = order
            .into_iter()
            .map(|i| &tables[i])
            .filter(|t| !t.diff.is_unchanged())
            .collect();

        let identifiers = self.assign_identifiers(changed.len(), known, now)?;
        let extension_len = if self.config.file_extension.is_empty() {
            0
        } else {
            self.config.file_extension.len() + 1
        };

        let mut steps = Vec::with_capacity(changed.len());
        let mut used_names = HashSet::new();
        for (table, identifier) in changed.into_iter().zip(identifiers) {
            let diff = &table.diff;
            let budget = self
                .config
                .max_file_name_len
                .saturating_sub(identifier.to_string().len() + 1 + extension_len);
            let mut name = bounded_name(&name_parts(diff), budget);
            if used_names.contains(&name) {
                name = unique_name(&name, &used_names, steps.len() + 1, budget);
            }
            used_names.insert(name.clone());
            let file_name = self.file_name(identifier, &name);
            let body = MigrationBody::from_up(up_operations(diff));
            debug!(
                entity = %diff.entity,
                identifier = %identifier,
                file_name = %file_name,
                operations = body.up.len(),
                "Synthesized migration step"
            );
            steps.push(MigrationStep {
                entity: diff.entity.clone(),
                table: diff.table.clone(),
                identifier,
                name,
                file_name,
                body,
            });
        }

        info!(steps = steps.len(), "Migration plan ready");
        Ok(MigrationPlan { steps })
    }

    fn file_name(&self, identifier: MigrationId, name: &str) -> String {
        if self.config.file_extension.is_empty() {
            format!("{identifier}_{name}")
        } else {
            format!("{identifier}_{name}.{}", self.config.file_extension)
        }
    }

    fn assign_identifiers(
        &self,
        count: usize,
        known: &[String],
        now: NaiveDateTime,
    ) -> Result<Vec<MigrationId>> {
        let taken: Vec<u64> = known.iter().filter_map(|k| parse_identifier(k)).collect();
        let latest = taken.iter().max().copied();
        let convention = self.config.convention;
        let first = match convention {
            IdentifierConvention::Timestamp => {
                let stamp = timestamp_value(now);
                latest.map_or(stamp, |latest| stamp.max(latest + 1))
            }
            IdentifierConvention::Sequential => latest.map_or(1, |latest| latest + 1),
        };

        let mut seen: HashSet<u64> = taken.into_iter().collect();
        let mut identifiers = Vec::with_capacity(count);
        for value in (first..).take(count) {
            let identifier = MigrationId::new(value, convention);
            if !seen.insert(value) {
                return Err(GenerationError::IdentifierCollision(identifier.to_string()));
            }
            identifiers.push(identifier);
        }
        Ok(identifiers)
    }
}

fn timestamp_value(now: NaiveDateTime) -> u64 {
    let year = u64::try_from(now.year()).unwrap_or(0);
    year * 10_000_000_000
        + u64::from(now.month()) * 100_000_000
        + u64::from(now.day()) * 1_000_000
        + u64::from(now.hour()) * 10_000
        + u64::from(now.minute()) * 100
        + u64::from(now.second())
}

/// Kahn's algorithm over table references; ready tables leave in name order.
fn dependency_order(tables: &[PlannedTable]) -> Result<Vec<usize>> {
    let positions: HashMap<&str, usize> = tables
        .iter()
        .enumerate()
        .map(|(i, t)| (t.diff.entity.as_str(), i))
        .collect();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for table in tables {
        let entity = table.diff.entity.as_str();
        in_degree.entry(entity).or_insert(0);
        for dependency in &table.references {
            let dependency = dependency.as_str();
            if dependency == entity || !positions.contains_key(dependency) {
                continue;
            }
            *in_degree.entry(entity).or_insert(0) += 1;
            dependents.entry(dependency).or_default().push(entity);
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(entity, _)| *entity)
        .collect();
    let mut order = Vec::with_capacity(tables.len());

    while let Some(entity) = ready.pop_first() {
        if let Some(position) = positions.get(entity) {
            order.push(*position);
        }
        if let Some(waiting) = dependents.get(entity) {
            for dependent in waiting {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }
    }

    if order.len() != tables.len() {
        let mut cycle: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, degree)| *degree > 0)
            .map(|(entity, _)| entity.to_string())
            .collect();
        cycle.sort();
        return Err(GenerationError::DependencyCycle(cycle));
    }
    Ok(order)
}

fn up_operations(diff: &SchemaDiff) -> Vec<MigrationOp> {
    let mut up = Vec::new();
    if diff.table_exists {
        for column in &diff.columns {
            match column {
                ColumnDiff::Add { column } => {
                    up.push(MigrationOp::add_column(&diff.table, column.clone()));
                }
                ColumnDiff::SafeAlter { column, existing }
                | ColumnDiff::LossyAlter { column, existing } => {
                    up.push(MigrationOp::change_column(
                        &diff.table,
                        column.clone(),
                        existing.to_spec(),
                    ));
                }
                ColumnDiff::Unchanged { .. } => {}
            }
        }
    } else {
        let columns = diff
            .columns
            .iter()
            .filter_map(|column| match column {
                ColumnDiff::Add { column } => Some(column.clone()),
                _ => None,
            })
            .collect();
        up.push(MigrationOp::create_table(&diff.table, columns));
    }
    for index in &diff.indexes {
        if let IndexDiff::Add { index } = index {
            up.push(MigrationOp::create_index(&diff.table, index));
        }
    }
    up
}

/// Name components; trailing `tail` components are dropped first when the
/// name is too long.
#[derive(Debug, Default)]
struct NameParts {
    head: Vec<String>,
    tail: Vec<String>,
}

fn name_parts(diff: &SchemaDiff) -> NameParts {
    if !diff.table_exists {
        return NameParts {
            head: vec!["create".to_string(), diff.table.clone()],
            tail: Vec::new(),
        };
    }

    let mut added = Vec::new();
    let mut altered = Vec::new();
    for column in &diff.columns {
        match column {
            ColumnDiff::Add { column } => added.push(column.name.clone()),
            ColumnDiff::SafeAlter { column, .. } | ColumnDiff::LossyAlter { column, .. } => {
                altered.push(column.name.clone());
            }
            ColumnDiff::Unchanged { .. } => {}
        }
    }

    let verb = match (added.is_empty(), altered.is_empty()) {
        (false, true) => "add",
        (true, false) => "change",
        (false, false) => "update",
        (true, true) => "index",
    };

    let mut tail: Vec<String> = added.into_iter().chain(altered).collect();
    if tail.is_empty() {
        for index in &diff.indexes {
            if let IndexDiff::Add { index } = index {
                for column in &index.columns {
                    if !tail.contains(column) {
                        tail.push(column.clone());
                    }
                }
            }
        }
    }

    NameParts {
        head: vec![verb.to_string(), diff.table.clone()],
        tail,
    }
}

fn sanitize(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

fn join(components: &[String]) -> String {
    components
        .iter()
        .map(|c| sanitize(c))
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn bounded_name(parts: &NameParts, budget: usize) -> String {
    let mut keep = parts.tail.len();
    loop {
        let components: Vec<String> = parts
            .head
            .iter()
            .chain(&parts.tail[..keep])
            .cloned()
            .collect();
        let name = join(&components);
        if name.len() <= budget || keep == 0 {
            return cut(name, budget);
        }
        keep -= 1;
    }
}

fn cut(mut name: String, budget: usize) -> String {
    if name.is_empty() {
        name = FALLBACK_NAME.to_string();
    }
    if name.len() > budget {
        name.truncate(budget.max(1));
        while name.len() > 1 && name.ends_with('_') {
            name.pop();
        }
    }
    name
}

/// Suffixes `name` with the first ordinal from `first` up that is unused.
fn unique_name(name: &str, used: &HashSet<String>, first: usize, budget: usize) -> String {
    (first..)
        .map(|ordinal| disambiguate(name, ordinal, budget))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

fn disambiguate(name: &str, ordinal: usize, budget: usize) -> String {
    let suffix = format!("_{ordinal}");
    let room = budget.saturating_sub(suffix.len()).max(1);
    let mut base = name.to_string();
    base.truncate(room);
    let base = base.trim_end_matches('_');
    format!("{base}{suffix}")
}
