//! Resource ledger and structure level seams consumed by the raid engine.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Resource name to quantity mapping. Ordered so reasons and reports are stable.
pub type ResourceBag = BTreeMap<String, u64>;

/// One resource the player is short of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortfall {
    pub resource: String,
    pub required: u64,
    pub available: u64,
}

impl Shortfall {
    /// Quantity still missing.
    #[must_use]
    pub const fn missing(&self) -> u64 {
        self.required.saturating_sub(self.available)
    }
}

impl std::fmt::Display for Shortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.missing(), self.resource)
    }
}

/// Errors raised by ledger mutations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient {resource}: need {required}, have {available}")]
    Insufficient {
        resource: String,
        required: u64,
        available: u64,
    },
    #[error("crediting {amount} {resource} would overflow the balance")]
    Overflow { resource: String, amount: u64 },
}

/// Resource balances owned by the wider game state.
///
/// Every operation is synchronous and atomic on its own; the engine never
/// holds a ledger borrow across ticks.
pub trait ResourceLedger {
    /// Current balance of a resource (0 when unknown).
    fn balance(&self, resource: &str) -> u64;

    /// Deduct every entry of `cost` or none of them.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Insufficient`] for the first entry that cannot be
    /// covered; in that case no balance is modified.
    fn spend_all(&mut self, cost: &ResourceBag) -> Result<(), LedgerError>;

    /// Add `amount` of `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] when the balance cannot hold the credit.
    fn credit(&mut self, resource: &str, amount: u64) -> Result<(), LedgerError>;

    /// Remove up to `amount`, clamping the balance at zero. Returns the amount removed.
    fn debit_saturating(&mut self, resource: &str, amount: u64) -> u64;

    /// Every resource in `cost` the ledger cannot cover, in resource order.
    fn shortfalls(&self, cost: &ResourceBag) -> Vec<Shortfall> {
        cost.iter()
            .filter_map(|(resource, &required)| {
                let available = self.balance(resource);
                (available < required).then(|| Shortfall {
                    resource: resource.clone(),
                    required,
                    available,
                })
            })
            .collect()
    }
}

/// In-memory resource ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stockpile {
    balances: ResourceBag,
}

impl Stockpile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a stockpile from `(resource, amount)` pairs.
    #[must_use]
    pub fn with_balances<'a>(entries: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        Self {
            balances: entries
                .into_iter()
                .map(|(resource, amount)| (resource.to_string(), amount))
                .collect(),
        }
    }

    /// Overwrite a balance.
    pub fn set(&mut self, resource: &str, amount: u64) {
        self.balances.insert(resource.to_string(), amount);
    }

    /// Borrow all balances.
    #[must_use]
    pub const fn balances(&self) -> &ResourceBag {
        &self.balances
    }
}

impl ResourceLedger for Stockpile {
    fn balance(&self, resource: &str) -> u64 {
        self.balances.get(resource).copied().unwrap_or(0)
    }

    fn spend_all(&mut self, cost: &ResourceBag) -> Result<(), LedgerError> {
        if let Some(short) = self.shortfalls(cost).into_iter().next() {
            return Err(LedgerError::Insufficient {
                resource: short.resource,
                required: short.required,
                available: short.available,
            });
        }
        for (resource, amount) in cost {
            let entry = self.balances.entry(resource.clone()).or_insert(0);
            *entry -= amount;
        }
        Ok(())
    }

    fn credit(&mut self, resource: &str, amount: u64) -> Result<(), LedgerError> {
        let current = self.balance(resource);
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                resource: resource.to_string(),
                amount,
            })?;
        self.balances.insert(resource.to_string(), updated);
        Ok(())
    }

    fn debit_saturating(&mut self, resource: &str, amount: u64) -> u64 {
        let current = self.balance(resource);
        let removed = current.min(amount);
        self.balances.insert(resource.to_string(), current - removed);
        removed
    }
}

/// Structure (building) levels owned by the wider game state.
pub trait StructureLevels {
    /// Level of a structure, 0 when it has not been built.
    fn level(&self, structure: &str) -> u32;
}

impl StructureLevels for BTreeMap<String, u32> {
    fn level(&self, structure: &str) -> u32 {
        self.get(structure).copied().unwrap_or(0)
    }
}

impl StructureLevels for HashMap<String, u32> {
    fn level(&self, structure: &str) -> u32 {
        self.get(structure).copied().unwrap_or(0)
    }
}
