//! Stock adjustment policies.

use serde::{Deserialize, Serialize};

/// How the writer takes units out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    /// Read the product, then write `stock - quantity` in a second call.
    ///
    /// There is no lower bound and nothing stops another checkout from
    /// writing between the read and the write, so concurrent checkouts lose
    /// updates and stock can go negative.
    #[default]
    ReadModifyWrite,

    /// One conditional decrement that only applies while
    /// `stock >= quantity`. A rejected decrement fails the order.
    Conditional,
}

impl StockPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockPolicy::ReadModifyWrite => "read_modify_write",
            StockPolicy::Conditional => "conditional",
        }
    }
}

impl std::fmt::Display for StockPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read_modify_write" | "read-modify-write" => Ok(StockPolicy::ReadModifyWrite),
            "conditional" => Ok(StockPolicy::Conditional),
            other => Err(format!("unknown stock policy: {other}")),
        }
    }
}
