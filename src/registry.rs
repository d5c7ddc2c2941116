//! Bookkeeping for rows inserted at runtime under the sections of a scoring
//! table.
//!
//! Static template rows own the id range below the reserved threshold. Rows
//! added while editing get synthetic ids from that threshold upwards, and each
//! one is registered under the section (parent) row it was inserted into.

use crate::error::{RegistryError, Result};
use log::{debug, warn};
use std::{
    borrow::Borrow,
    collections::{BTreeMap, HashMap},
    fmt,
};

/// Threshold used when none is configured.
pub const DEFAULT_RESERVED_THRESHOLD: u64 = 1000;

/// Largest accepted threshold. Keeps the synthetic range far from `u64::MAX`.
pub const MAX_RESERVED_THRESHOLD: u64 = u32::MAX as u64;

/// Index of a section row in the static template.
pub type ParentRowIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(u64);

impl RowId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque key of a scorable row. The format belongs to the caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScoreAddress(String);

impl ScoreAddress {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScoreAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScoreAddress {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ScoreAddress {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ScoreAddress {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct RowRegistry {
    threshold: RowId,
    next_row_id: RowId,
    /// Children per parent, in on-screen order. Never holds an empty `Vec`.
    children: BTreeMap<ParentRowIndex, Vec<ScoreAddress>>,
    /// Exact inverse of `children`.
    parents: HashMap<ScoreAddress, ParentRowIndex>,
}

impl Default for RowRegistry {
    fn default() -> Self {
        Self::empty(RowId(DEFAULT_RESERVED_THRESHOLD))
    }
}

impl RowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry whose synthetic ids start at `threshold`.
    ///
    /// Thresholds of zero or above [`MAX_RESERVED_THRESHOLD`] are rejected.
    pub fn with_threshold(threshold: u64) -> Result<Self> {
        if threshold == 0 || threshold > MAX_RESERVED_THRESHOLD {
            return Err(RegistryError::InvalidConfiguration(format!(
                "reserved threshold must be in 1..={MAX_RESERVED_THRESHOLD}, got {threshold}"
            )));
        }
        Ok(Self::empty(RowId(threshold)))
    }

    fn empty(threshold: RowId) -> Self {
        Self {
            threshold,
            next_row_id: threshold,
            children: BTreeMap::new(),
            parents: HashMap::new(),
        }
    }

    pub fn threshold(&self) -> RowId {
        self.threshold
    }

    /// The id the next call to [`allocate_row_id`](Self::allocate_row_id) returns.
    pub fn peek_row_id(&self) -> RowId {
        self.next_row_id
    }

    pub fn is_synthetic(&self, id: RowId) -> bool {
        id >= self.threshold
    }

    /// Returns the next synthetic id and advances the counter.
    ///
    /// Fails with [`RegistryError::RowIdExhausted`] instead of wrapping into
    /// the reserved range.
    pub fn allocate_row_id(&mut self) -> Result<RowId> {
        let id = self.next_row_id;
        self.next_row_id = Self::successor(id)?;
        Ok(id)
    }

    fn successor(id: RowId) -> Result<RowId> {
        id.0.checked_add(1)
            .map(RowId)
            .ok_or(RegistryError::RowIdExhausted { last: id.0 })
    }

    /// Appends `address` to the children of `parent`.
    ///
    /// Adding an address already registered under the same parent is a no-op:
    /// the address keeps its original position in [`children_of`](Self::children_of).
    /// Adding one registered under a different parent fails with
    /// [`RegistryError::InvariantViolation`] and leaves the registry unchanged.
    pub fn add_child(
        &mut self,
        parent: ParentRowIndex,
        address: impl Into<ScoreAddress>,
    ) -> Result<()> {
        let address = address.into();
        match self.parents.get(&address) {
            Some(&owner) if owner == parent => {
                debug!("Address {address} already under parent {parent}, ignoring");
                Ok(())
            }
            Some(&owner) => {
                warn!("Rejected {address} under parent {parent}: already under parent {owner}");
                Err(RegistryError::InvariantViolation {
                    address: address.0,
                    registered_under: owner,
                    requested: parent,
                })
            }
            None => {
                debug!("Adding {address} under parent {parent}");
                self.children
                    .entry(parent)
                    .or_default()
                    .push(address.clone());
                self.parents.insert(address, parent);
                Ok(())
            }
        }
    }

    /// Allocates an id, builds the row's address from it and registers the
    /// address under `parent`.
    ///
    /// The built address must be new: an address already registered under
    /// any parent, `parent` included, fails with
    /// [`RegistryError::InvariantViolation`]. The counter only advances when
    /// registration succeeds.
    pub fn insert_row<F>(&mut self, parent: ParentRowIndex, make_address: F) -> Result<RowId>
    where
        F: FnOnce(RowId) -> ScoreAddress,
    {
        let id = self.next_row_id;
        let next = Self::successor(id)?;
        let address = make_address(id);

        if let Some(owner) = self.parent_of(address.as_str()) {
            warn!("Rejected new row {address} under parent {parent}: already under parent {owner}");
            return Err(RegistryError::InvariantViolation {
                address: address.0,
                registered_under: owner,
                requested: parent,
            });
        }

        self.add_child(parent, address)?;
        self.next_row_id = next;
        Ok(id)
    }

    /// Removes `address` from the children of `parent`. Absent addresses are
    /// ignored.
    pub fn remove_child(&mut self, parent: ParentRowIndex, address: &str) {
        let Some(rows) = self.children.get_mut(&parent) else {
            return;
        };
        let Some(pos) = rows.iter().position(|a| a.as_str() == address) else {
            return;
        };

        rows.remove(pos);
        if rows.is_empty() {
            self.children.remove(&parent);
        }
        self.parents.remove(address);
        debug!("Removed {address} from parent {parent}");
    }

    pub fn children_of(&self, parent: ParentRowIndex) -> &[ScoreAddress] {
        self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parent_of(&self, address: &str) -> Option<ParentRowIndex> {
        self.parents.get(address).copied()
    }

    /// Parents owning at least one child, ascending.
    pub fn parents(&self) -> impl Iterator<Item = ParentRowIndex> + '_ {
        self.children.keys().copied()
    }

    /// Number of registered child rows across all parents.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn reset(&mut self) {
        debug!(
            "Resetting registry ({} rows, next id {})",
            self.len(),
            self.next_row_id
        );
        self.children.clear();
        self.parents.clear();
        self.next_row_id = self.threshold;
    }

    /// Recomputes the inverse of the children map and compares it with the
    /// maintained lookup.
    pub fn check_consistency(&self) -> Result<()> {
        let mut seen = 0;
        for (&parent, rows) in &self.children {
            for address in rows {
                seen += 1;
                if self.parents.get(address) != Some(&parent) {
                    return Err(RegistryError::InconsistentLookup {
                        address: address.0.clone(),
                    });
                }
            }
        }

        if seen != self.parents.len() {
            // Either a duplicate in `children` or a stale entry in `parents`.
            let stale = self
                .parents
                .iter()
                .find(|&(address, parent)| {
                    self.children_of(*parent)
                        .iter()
                        .filter(|a| *a == address)
                        .count()
                        != 1
                })
                .map(|(address, _)| address.0.clone())
                .unwrap_or_default();
            return Err(RegistryError::InconsistentLookup { address: stale });
        }
        Ok(())
    }
}
