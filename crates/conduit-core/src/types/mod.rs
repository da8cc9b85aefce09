//! Shared core types used across the plugin, registry and dispatch layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier of a tool category on the slave side (e.g. `TicketTracker`).
pub type ToolId = String;

/// Identifier of an action a tool can perform (e.g. `Ticket_RejectDuplicate`).
pub type ActionId = String;

/// Wildcard accepted in a slave client's tool list.
pub const ALL_TOOLS: &str = "*";

/// ID of the master server component.
pub const MASTER_SERVER: &str = "Master";

/// ID of the slave server component.
pub const SLAVE_SERVER: &str = "Slave";

/// Plugin categories. Each category is its own namespace for plugin IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Slave-side effect of one (product, tool, action).
    Adapter,
    /// Supplies environment capabilities to installers.
    Provider,
    /// Master-side translation of an event into slave actions.
    Process,
    /// Master-side transport to one slave.
    Sender,
    /// Hook in an originating tool that triggers a master dispatch.
    Listener,
    /// Master or slave runtime entry points.
    Server,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Server,
        Category::Provider,
        Category::Adapter,
        Category::Listener,
        Category::Process,
        Category::Sender,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Adapter => "Adapter",
            Category::Provider => "Provider",
            Category::Process => "Process",
            Category::Sender => "Sender",
            Category::Listener => "Listener",
            Category::Server => "Server",
        }
    }

    /// Directory name scanned for manifest plugins of this category.
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Adapter => "adapter",
            Category::Provider => "provider",
            Category::Process => "process",
            Category::Sender => "sender",
            Category::Listener => "listener",
            Category::Server => "server",
        }
    }

    /// Whether components of this category go through the installer.
    ///
    /// Processes and senders are activated by the master server installation
    /// and are never installed on their own.
    pub fn is_installable(self) -> bool {
        matches!(
            self,
            Category::Adapter | Category::Provider | Category::Listener | Category::Server
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<_> = Category::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown category '{}' (expected one of: {})", s, known.join(", "))
            })
    }
}

/// Address of an installable component: `<Category>/<ID>`.
///
/// Adapter IDs are themselves paths (`<Product>/<Tool>/<Action>`), so only the
/// first segment is taken as the category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentPath {
    category: Category,
    id: String,
}

impl ComponentPath {
    pub fn new(category: Category, id: impl Into<String>) -> Self {
        Self {
            category,
            id: id.into(),
        }
    }

    pub fn parse(path: &str) -> Result<Self, String> {
        let trimmed = path.trim().trim_matches('/');
        let (category, id) = trimmed
            .split_once('/')
            .ok_or_else(|| format!("component path '{}' must look like <Category>/<ID>", path))?;
        let category: Category = category.parse()?;
        if id.is_empty() {
            return Err(format!("component path '{}' has an empty ID", path));
        }
        Ok(Self::new(category, id))
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Key under which the component is stored in the installed registry.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.id)
    }
}

/// (Product, Tool, Action) identity of an installed adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AdapterTriple {
    pub product: String,
    pub tool: ToolId,
    pub action: ActionId,
}

impl AdapterTriple {
    pub fn new(
        product: impl Into<String>,
        tool: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            product: product.into(),
            tool: tool.into(),
            action: action.into(),
        }
    }

    /// Parse an adapter plugin ID of the form `<Product>/<Tool>/<Action>`.
    pub fn from_id(id: &str) -> Option<Self> {
        let mut parts = id.split('/');
        let product = parts.next()?;
        let tool = parts.next()?;
        let action = parts.next()?;
        if parts.next().is_some() || product.is_empty() || tool.is_empty() || action.is_empty()
        {
            return None;
        }
        Some(Self::new(product, tool, action))
    }

    pub fn id(&self) -> String {
        format!("{}/{}/{}", self.product, self.tool, self.action)
    }
}

impl fmt::Display for AdapterTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.product, self.tool, self.action)
    }
}
