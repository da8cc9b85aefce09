//! Plugin identity and the command-line variables a plugin declares.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// How a variable is read from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarKind {
    /// A single string value (`--name VALUE`).
    #[default]
    Value,
    /// A boolean switch (`--name`).
    Flag,
    /// A repeatable value (`--name A --name B`).
    List,
}

/// One command-line variable declared by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VarOption {
    /// Variable name the plugin reads its value under.
    pub name: String,

    /// Long flag, without the leading dashes. Derived from `name` when empty.
    #[serde(default)]
    pub long: String,

    #[serde(default)]
    pub short: Option<char>,

    #[serde(default)]
    pub kind: VarKind,

    #[serde(default)]
    pub help: String,

    /// The installer refuses to proceed while a mandatory variable is unbound.
    #[serde(default)]
    pub mandatory: bool,

    /// Value bound when the flag is not given. Satisfies `mandatory`.
    #[serde(default)]
    pub default: Option<String>,
}

impl VarOption {
    pub fn value(name: impl Into<String>, help: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            long: name.replace('_', "-"),
            name,
            short: None,
            kind: VarKind::Value,
            help: help.into(),
            mandatory: false,
            default: None,
        }
    }

    pub fn flag(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            kind: VarKind::Flag,
            ..Self::value(name, help)
        }
    }

    pub fn list(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            kind: VarKind::List,
            ..Self::value(name, help)
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn with_long(mut self, long: impl Into<String>) -> Self {
        self.long = long.into();
        self
    }

    pub fn with_short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Fill in the long flag of an option read from a manifest.
    pub fn normalized(mut self) -> Self {
        if self.long.is_empty() {
            self.long = self.name.replace('_', "-");
        }
        self
    }

    /// Human-readable flag spelling, e.g. `--cgi-url` or `--force/-f`.
    pub fn flag_display(&self) -> String {
        match self.short {
            Some(short) => format!("--{}/-{}", self.long, short),
            None => format!("--{}", self.long),
        }
    }
}

/// Identity and declared variables of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    pub id: String,
    pub description: String,
    pub author: String,
    pub version: semver::Version,
    pub options: Vec<VarOption>,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>, version: semver::Version) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            author: String::new(),
            version,
            options: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_option(mut self, option: VarOption) -> Self {
        self.options.push(option);
        self
    }

    /// Options that must be bound before the plugin is checked or run.
    pub fn mandatory_options(&self) -> impl Iterator<Item = &VarOption> {
        self.options.iter().filter(|o| o.mandatory)
    }

    /// Validate the option declarations of this plugin in isolation.
    ///
    /// Cross-plugin flag collisions are detected later, when descriptors are
    /// composed into a single parser.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.id.trim().is_empty() {
            anyhow::bail!("plugin ID must not be empty");
        }

        let mut names = HashSet::new();
        let mut longs = HashSet::new();
        let mut shorts = HashSet::new();
        for option in &self.options {
            if option.name.is_empty() {
                anyhow::bail!("option names must not be empty");
            }
            if !names.insert(option.name.as_str()) {
                anyhow::bail!("option '{}' is declared twice", option.name);
            }
            if !is_valid_long(&option.long) {
                anyhow::bail!(
                    "option '{}' has an invalid long flag '{}'",
                    option.name,
                    option.long
                );
            }
            if !longs.insert(option.long.as_str()) {
                anyhow::bail!("flag --{} is declared twice", option.long);
            }
            if let Some(short) = option.short
                && (!short.is_ascii_alphanumeric() || !shorts.insert(short))
            {
                anyhow::bail!("option '{}' has an invalid or repeated short flag", option.name);
            }
            if option.kind == VarKind::Flag && option.mandatory {
                anyhow::bail!("flag option '{}' cannot be mandatory", option.name);
            }
        }
        Ok(())
    }
}

fn is_valid_long(long: &str) -> bool {
    !long.is_empty()
        && !long.starts_with('-')
        && long
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
