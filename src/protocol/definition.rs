//! Parsers for the documents the host pipes to stdin.
//!
//! - streaming mode: `<input>` with metadata and a `<configuration>` block
//! - `--validate-arguments`: `<items>` with metadata and one `<item>`
//!
//! Both documents carry the same metadata children (`server_host`,
//! `server_uri`, `session_key`, `checkpoint_dir`, ...) which are collected
//! verbatim into a map.

use std::collections::BTreeMap;

use super::xml::{parse_document, Element};
use crate::error::{ModularInputError, Result};

/// Metadata key holding the management API URI.
pub const SERVER_URI: &str = "server_uri";
/// Metadata key holding the host name of the server.
pub const SERVER_HOST: &str = "server_host";
/// Metadata key holding the session key for the management API.
pub const SESSION_KEY: &str = "session_key";
/// Metadata key holding the checkpoint directory.
pub const CHECKPOINT_DIR: &str = "checkpoint_dir";
/// Metadata key holding the stanza under validation.
pub const NAME: &str = "name";

/// Key/value metadata shared by both definitions.
pub type Metadata = BTreeMap<String, String>;

/// Parameters of one stanza.
pub type Params = BTreeMap<String, ParamValue>;

/// A configured parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// `<param name="..">value</param>`
    Single(String),
    /// `<param_list name=".."><value>..</value>...</param_list>`
    Multi(Vec<String>),
}

impl ParamValue {
    /// The value if this is a single parameter.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Single(value) => Some(value),
            ParamValue::Multi(_) => None,
        }
    }

    /// All values; a single parameter yields one item.
    pub fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::Single(value) => vec![value.as_str()],
            ParamValue::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// Configured stanzas plus metadata for a streaming run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputDefinition {
    /// Root-level metadata.
    pub metadata: Metadata,
    /// Stanza name to its parameters.
    pub inputs: BTreeMap<String, Params>,
}

impl InputDefinition {
    /// Parse an `<input>` document.
    pub fn parse(document: &str) -> Result<Self> {
        let root = parse_document(document)?;
        expect_root(&root, "input")?;

        let mut definition = InputDefinition::default();
        for node in root.children() {
            if node.name() != "configuration" {
                insert_metadata(&mut definition.metadata, node);
                continue;
            }
            for stanza in node.children_named("stanza") {
                let name = stanza.require_attr("name")?;
                let params = parse_params(stanza)?;
                if definition.inputs.insert(name.to_owned(), params).is_some() {
                    return Err(ModularInputError::ConfigParse(format!(
                        "duplicate stanza `{}`",
                        name
                    )));
                }
            }
        }
        Ok(definition)
    }

    /// Parameters of the named stanza.
    pub fn stanza(&self, name: &str) -> Option<&Params> {
        self.inputs.get(name)
    }

    /// Management API URI.
    pub fn server_uri(&self) -> Option<&str> {
        self.metadata.get(SERVER_URI).map(String::as_str)
    }

    /// Server host name.
    pub fn server_host(&self) -> Option<&str> {
        self.metadata.get(SERVER_HOST).map(String::as_str)
    }

    /// Session key for the management API.
    pub fn session_key(&self) -> Option<&str> {
        self.metadata.get(SESSION_KEY).map(String::as_str)
    }

    /// Directory where the input may keep checkpoints between runs.
    pub fn checkpoint_dir(&self) -> Option<&str> {
        self.metadata.get(CHECKPOINT_DIR).map(String::as_str)
    }
}

/// A single proposed stanza awaiting validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationDefinition {
    /// Root-level metadata, plus `name` for the stanza.
    pub metadata: Metadata,
    /// Proposed parameters.
    pub parameters: Params,
}

impl ValidationDefinition {
    /// Parse an `<items>` document.
    pub fn parse(document: &str) -> Result<Self> {
        let root = parse_document(document)?;
        expect_root(&root, "items")?;

        let mut definition = ValidationDefinition::default();
        let mut items = 0usize;
        for node in root.children() {
            if node.name() != "item" {
                insert_metadata(&mut definition.metadata, node);
                continue;
            }
            items += 1;
            if items > 1 {
                return Err(ModularInputError::ConfigParse(
                    "<items> must contain exactly one <item>".to_string(),
                ));
            }
            let name = node.require_attr("name")?;
            definition.metadata.insert(NAME.to_string(), name.to_owned());
            definition.parameters = parse_params(node)?;
        }
        if items == 0 {
            return Err(ModularInputError::ConfigParse(
                "<items> must contain exactly one <item>".to_string(),
            ));
        }
        Ok(definition)
    }

    /// Name of the stanza under validation.
    pub fn name(&self) -> &str {
        self.metadata.get(NAME).map(String::as_str).unwrap_or_default()
    }

    /// Single-valued parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(ParamValue::as_str)
    }
}

fn expect_root(root: &Element, name: &str) -> Result<()> {
    if root.name() == name {
        return Ok(());
    }
    Err(ModularInputError::ConfigParse(format!(
        "expected <{}> root, found <{}>",
        name,
        root.name()
    )))
}

fn insert_metadata(metadata: &mut Metadata, node: &Element) {
    metadata.insert(node.name().to_owned(), node.text().to_owned());
}

fn parse_params(stanza: &Element) -> Result<Params> {
    let mut params = Params::new();
    for node in stanza.children() {
        let value = match node.name() {
            "param" => ParamValue::Single(node.text().to_owned()),
            "param_list" | "param_array" => ParamValue::Multi(
                node.children_named("value")
                    .map(|v| v.text().to_owned())
                    .collect(),
            ),
            _ => continue,
        };
        params.insert(node.require_attr("name")?.to_owned(), value);
    }
    Ok(params)
}
