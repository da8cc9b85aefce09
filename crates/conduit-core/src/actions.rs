//! The action set a process produces and slaves consume.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{ALL_TOOLS, ActionId, ToolId};

/// Tool → action → ordered occurrences, each occurrence an ordered list of
/// parameters.
///
/// Built once per dispatch by a process and never mutated afterwards. Maps are
/// kept sorted so serialization is deterministic; occurrence and parameter
/// order are preserved as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlaveActions {
    tools: BTreeMap<ToolId, BTreeMap<ActionId, Vec<Vec<String>>>>,
}

impl SlaveActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one occurrence of `action` on `tool`.
    pub fn push<I, S>(&mut self, tool: impl Into<String>, action: impl Into<String>, params: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools
            .entry(tool.into())
            .or_default()
            .entry(action.into())
            .or_default()
            .push(params.into_iter().map(Into::into).collect());
    }

    /// Builder-style [`SlaveActions::push`].
    pub fn with<I, S>(mut self, tool: impl Into<String>, action: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(tool, action, params);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tools(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn actions_for(&self, tool: &str) -> Option<&BTreeMap<ActionId, Vec<Vec<String>>>> {
        self.tools.get(tool)
    }

    /// Every `(tool, action, params)` occurrence in map order.
    pub fn occurrences(&self) -> impl Iterator<Item = (&str, &str, &[String])> {
        self.tools.iter().flat_map(|(tool, actions)| {
            actions.iter().flat_map(move |(action, occurrences)| {
                occurrences
                    .iter()
                    .map(move |params| (tool.as_str(), action.as_str(), params.as_slice()))
            })
        })
    }

    /// Total number of action occurrences.
    pub fn len(&self) -> usize {
        self.occurrences().count()
    }

    /// The subset of tools a client with `accepted` tools should receive.
    ///
    /// The wildcard [`ALL_TOOLS`] accepts everything.
    pub fn filter_for(&self, accepted: &BTreeSet<String>) -> SlaveActions {
        if accepted.contains(ALL_TOOLS) {
            return self.clone();
        }
        let tools = self
            .tools
            .iter()
            .filter(|(tool, _)| accepted.contains(tool.as_str()))
            .map(|(tool, actions)| (tool.clone(), actions.clone()))
            .collect();
        SlaveActions { tools }
    }
}
