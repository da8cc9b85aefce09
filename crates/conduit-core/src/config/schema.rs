//! Configuration schema for conduit.toml

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Connection parameters handed to a sender, as plain strings.
pub type ConnectionParams = BTreeMap<String, String>;

/// Root configuration structure for conduit.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConduitConfig {
    /// Slave clients, in delivery order.
    #[serde(default)]
    pub slave: Vec<SlaveClientEntry>,
}

/// One `[[slave]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlaveClientEntry {
    /// Label used in logs and reports. Defaults to `<type>#<n>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Sender plugin ID.
    #[serde(rename = "type")]
    pub kind: String,

    /// Tools this slave accepts actions for; `*` accepts all.
    pub tools: BTreeSet<String>,

    /// Sender connection parameters. Scalars are stringified.
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
}

/// A slave client ready for the dispatch pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredSlaveClient {
    pub name: String,
    pub kind: String,
    pub tools: BTreeSet<String>,
    pub params: ConnectionParams,
}

impl RegisteredSlaveClient {
    pub fn new<I, S>(name: impl Into<String>, kind: impl Into<String>, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: kind.into(),
            tools: tools.into_iter().map(Into::into).collect(),
            params: ConnectionParams::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl ConduitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut names = BTreeSet::new();
        for (index, entry) in self.slave.iter().enumerate() {
            let label = entry
                .name
                .clone()
                .unwrap_or_else(|| format!("slave #{}", index + 1));
            if entry.kind.trim().is_empty() {
                anyhow::bail!("{}: 'type' must not be empty", label);
            }
            if entry.tools.is_empty() {
                anyhow::bail!("{}: 'tools' must list at least one tool (or \"*\")", label);
            }
            if let Some(name) = &entry.name
                && !names.insert(name.as_str())
            {
                anyhow::bail!("slave name '{}' is used more than once", name);
            }
            for (key, value) in &entry.params {
                if param_to_string(value).is_none() {
                    anyhow::bail!(
                        "{}: parameter '{}' must be a string, number or boolean",
                        label,
                        key
                    );
                }
            }
        }
        Ok(())
    }

    /// Slave clients in declaration order with names filled in.
    pub fn slave_clients(&self) -> Vec<RegisteredSlaveClient> {
        let mut counters: BTreeMap<&str, usize> = BTreeMap::new();
        self.slave
            .iter()
            .map(|entry| {
                let n = counters.entry(entry.kind.as_str()).or_default();
                *n += 1;
                let name = entry
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("{}#{}", entry.kind, n));
                RegisteredSlaveClient {
                    name,
                    kind: entry.kind.clone(),
                    tools: entry.tools.clone(),
                    params: entry
                        .params
                        .iter()
                        .filter_map(|(k, v)| param_to_string(v).map(|v| (k.clone(), v)))
                        .collect(),
                }
            })
            .collect()
    }
}

fn param_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}
