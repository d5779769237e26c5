//! Message schemas, data field definitions and per-constellation MSM lookup tables.
//!
//! Schema data is JSON. The built-in tables are embedded at compile time, and
//! [Registry::with_file] can be used to extend or override them with a user file
//! containing any of the following sections:
//!
//! ```json
//! {
//!   "fields": { "DF002": ["UINT", 12, 0, "Message Number"] },
//!   "schemas": { "hdr": [{ "field": "DF002" }], "9999": [{ "include": "hdr" }] },
//!   "messages": { "9999": { "schema": "9999", "description": "Custom" } },
//!   "constellations": {}
//! }
//! ```
//!
//! A schema is a list of nodes where each node is one of:
//! * `{"field": "<name>"}`
//! * `{"group": {"count": <count>, "nodes": [...]}}`
//! * `{"conditional": {"field": "<name>", "value": <u64>, "nodes": [...]}}`
//! * `{"include": "<schema>"}`, replaced by the nodes of another schema
//!
//! See [Count] for the repeat count forms.
use std::{
    collections::HashMap,
    fs::File,
    path::Path,
    sync::{Arc, OnceLock},
};

use serde::Deserialize;

mod fields;

pub use fields::{DataType, FieldDef};

use crate::{Error, Result};

const FIELDS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/src/schema/fields.json"
));
const MESSAGES: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/src/schema/messages.json"
));
const CONSTELLATIONS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/src/schema/constellations.json"
));

/// Source of the number of repeats of a group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Count {
    /// Literal count.
    Fixed(usize),
    /// Value of a previously decoded attribute, used as-is.
    Field(String),
    /// Value of a previously decoded attribute suffixed with the first `levels` indices
    /// of the enclosing groups, e.g., `DF379_02` for the second outer item.
    Indexed { field: String, levels: usize },
    /// Value of a previously decoded attribute plus one.
    FieldPlusOne(String),
    /// Spherical harmonic coefficient count computed from degree and order attributes
    /// of the enclosing group item.
    Harmonic(Harmonic),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmonicKind {
    Cosine,
    Sine,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Harmonic {
    pub kind: HarmonicKind,
    pub degree: String,
    pub order: String,
}

impl Harmonic {
    /// Number of coefficients for encoded `degree` and `order`, where the encoded values
    /// are one less than the actual degree and order.
    #[must_use]
    pub fn count(&self, degree: u64, order: u64) -> usize {
        harmonic_count(self.kind, degree, order)
    }
}

/// Closed-form spherical harmonic coefficient count.
///
/// With `N = degree + 1` and `M = order + 1` there are
/// `(N+1)(N+2)/2 - (N-M)(N-M+1)/2` cosine coefficients and `N+1` fewer sine
/// coefficients.
#[must_use]
pub fn harmonic_count(kind: HarmonicKind, degree: u64, order: u64) -> usize {
    // encoded degree and order are 4 bits
    let n = i64::try_from(degree.min(0xffff)).unwrap_or_default() + 1;
    let m = i64::try_from(order.min(0xffff)).unwrap_or_default() + 1;
    let cosine = (n + 1) * (n + 2) / 2 - (n - m) * (n - m + 1) / 2;
    let count = match kind {
        HarmonicKind::Cosine => cosine,
        HarmonicKind::Sine => cosine - (n + 1),
    };
    usize::try_from(count).unwrap_or(0)
}

/// Schema node as it appears in schema data, before includes are resolved.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
enum NodeDef {
    Field(String),
    Include(String),
    Group {
        count: Count,
        nodes: Vec<NodeDef>,
    },
    Conditional {
        field: String,
        value: u64,
        nodes: Vec<NodeDef>,
    },
}

/// A resolved schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Field {
        name: String,
        def: FieldDef,
    },
    /// Children repeated `count` times, each repetition adding an index level.
    Group {
        count: Count,
        children: Vec<SchemaNode>,
    },
    /// Children present only if `field` was decoded with value `value`.
    Conditional {
        field: String,
        value: u64,
        children: Vec<SchemaNode>,
    },
}

/// Per-constellation MSM satellite and signal lookup tables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Constellation {
    pub name: String,
    /// Name of the epoch time field for this constellation's MSM messages.
    pub epoch: String,
    prns: HashMap<u8, String>,
    signals: HashMap<u8, (String, String)>,
}

impl Constellation {
    /// Display PRN for a 1-based satellite mask bit position.
    #[must_use]
    pub fn prn(&self, bit: u8) -> Option<&str> {
        self.prns.get(&bit).map(String::as_str)
    }

    /// `(frequency band, RINEX code)` for a 1-based signal mask bit position.
    #[must_use]
    pub fn signal(&self, bit: u8) -> Option<(&str, &str)> {
        self.signals
            .get(&bit)
            .map(|(band, rinex)| (band.as_str(), rinex.as_str()))
    }
}

/// A message identity's schema.
#[derive(Debug, Clone)]
pub struct MessageDef {
    pub description: String,
    /// Name of the schema in the schema data. Shared by identities with the same layout.
    pub schema: String,
    pub nodes: Arc<[SchemaNode]>,
}

#[derive(Debug, Clone, Deserialize)]
struct MessageEntry {
    schema: String,
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SchemaFile {
    fields: HashMap<String, FieldDef>,
    schemas: HashMap<String, Vec<NodeDef>>,
    messages: HashMap<String, MessageEntry>,
    constellations: HashMap<String, Constellation>,
}

impl SchemaFile {
    fn builtin() -> Result<Self> {
        let mut file: SchemaFile = serde_json::from_str(MESSAGES)?;
        file.fields = serde_json::from_str(FIELDS)?;
        file.constellations = serde_json::from_str(CONSTELLATIONS)?;
        Ok(file)
    }

    /// Add all entries from `other` that do not already exist.
    fn merge(&mut self, other: SchemaFile) {
        for (k, v) in other.fields {
            self.fields.entry(k).or_insert(v);
        }
        for (k, v) in other.schemas {
            self.schemas.entry(k).or_insert(v);
        }
        for (k, v) in other.messages {
            self.messages.entry(k).or_insert(v);
        }
        for (k, v) in other.constellations {
            self.constellations.entry(k).or_insert(v);
        }
    }

    fn resolve_schema(&self, name: &str, stack: &mut Vec<String>) -> Result<Vec<SchemaNode>> {
        if stack.iter().any(|s| s == name) {
            return Err(Error::Schema(format!(
                "include cycle {} -> {name}",
                stack.join(" -> ")
            )));
        }
        let defs = self
            .schemas
            .get(name)
            .ok_or_else(|| Error::Schema(format!("unknown schema {name}")))?;
        stack.push(name.to_string());
        let nodes = self.resolve_nodes(defs, stack)?;
        stack.pop();
        Ok(nodes)
    }

    fn resolve_nodes(&self, defs: &[NodeDef], stack: &mut Vec<String>) -> Result<Vec<SchemaNode>> {
        let mut nodes = Vec::with_capacity(defs.len());
        for def in defs {
            match def {
                NodeDef::Field(name) => {
                    let def = self.fields.get(name).ok_or_else(|| {
                        Error::Schema(format!("schema {} uses unknown field {name}", stack.join("/")))
                    })?;
                    nodes.push(SchemaNode::Field {
                        name: name.clone(),
                        def: def.clone(),
                    });
                }
                NodeDef::Include(name) => nodes.extend(self.resolve_schema(name, stack)?),
                NodeDef::Group { count, nodes: children } => nodes.push(SchemaNode::Group {
                    count: count.clone(),
                    children: self.resolve_nodes(children, stack)?,
                }),
                NodeDef::Conditional {
                    field,
                    value,
                    nodes: children,
                } => nodes.push(SchemaNode::Conditional {
                    field: field.clone(),
                    value: *value,
                    children: self.resolve_nodes(children, stack)?,
                }),
            }
        }
        Ok(nodes)
    }
}

/// Lookup of message schemas, data field definitions and constellation tables.
///
/// The default implementation uses the schema data embedded at compile time. Use
/// [Registry::builtin] for a shared instance that is only loaded once per process.
///
/// # Example
/// ```
/// use rtcm::Registry;
///
/// let registry = Registry::builtin();
/// let def = registry.message("1005").unwrap();
/// assert_eq!(def.description, "Stationary RTK Reference Station ARP");
/// ```
#[derive(Debug)]
pub struct Registry {
    fields: HashMap<String, FieldDef>,
    messages: HashMap<String, MessageDef>,
    constellations: HashMap<String, Constellation>,
}

impl Default for Registry {
    fn default() -> Self {
        let file = SchemaFile::builtin().expect("built-in schema data is not valid");
        Self::build(file).expect("built-in schema data is not valid")
    }
}

static BUILTIN: OnceLock<Arc<Registry>> = OnceLock::new();

impl Registry {
    /// Shared instance of the built-in registry.
    pub fn builtin() -> Arc<Registry> {
        BUILTIN.get_or_init(|| Arc::new(Registry::default())).clone()
    }

    /// Load schema data from a JSON file. If `built_in` is true, the built-in tables
    /// are added for any entries not present in the file.
    ///
    /// # Errors
    /// If the file cannot be read or parsed, or if any schema references an unknown
    /// field or schema, or includes itself.
    pub fn with_file<P: AsRef<Path>>(path: P, built_in: bool) -> Result<Registry> {
        let mut file: SchemaFile = serde_json::from_reader(File::open(path)?)?;
        if built_in {
            file.merge(SchemaFile::builtin()?);
        }
        Self::build(file)
    }

    fn build(file: SchemaFile) -> Result<Registry> {
        let mut resolved: HashMap<&str, Arc<[SchemaNode]>> = HashMap::new();
        let mut messages = HashMap::with_capacity(file.messages.len());
        for (identity, entry) in &file.messages {
            let nodes = match resolved.get(entry.schema.as_str()) {
                Some(nodes) => nodes.clone(),
                None => {
                    let nodes: Arc<[SchemaNode]> =
                        file.resolve_schema(&entry.schema, &mut Vec::new())?.into();
                    resolved.insert(&entry.schema, nodes.clone());
                    nodes
                }
            };
            messages.insert(
                identity.clone(),
                MessageDef {
                    description: entry.description.clone(),
                    schema: entry.schema.clone(),
                    nodes,
                },
            );
        }
        drop(resolved);

        Ok(Registry {
            fields: file.fields,
            messages,
            constellations: file.constellations,
        })
    }

    #[must_use]
    pub fn message(&self, identity: &str) -> Option<&MessageDef> {
        self.messages.get(identity)
    }

    #[must_use]
    pub fn description(&self, identity: &str) -> Option<&str> {
        self.message(identity).map(|m| m.description.as_str())
    }

    /// All known message identities, sorted.
    #[must_use]
    pub fn identities(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.messages.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Field definition by name. Group index suffixes, e.g., `_01`, are stripped if
    /// there is no exact match.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        let mut name = name;
        loop {
            if let Some(def) = self.fields.get(name) {
                return Some(def);
            }
            let (base, suffix) = name.rsplit_once('_')?;
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            name = base;
        }
    }

    /// Constellation tables for an MSM message identity, selected by the first three
    /// digits, e.g., `107` for GPS.
    #[must_use]
    pub fn constellation(&self, identity: &str) -> Option<&Constellation> {
        identity
            .get(..3)
            .and_then(|prefix| self.constellations.get(prefix))
    }
}
