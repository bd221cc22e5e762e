// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Identifiers and state vectors
//!
//! Every piece of content in a document is created by exactly one replica and carries an [`Id`]:
//! the [`ClientId`] of that replica plus a per-client logical clock. Clocks of a single client are
//! dense: the first item a client creates has clock 0, the next one clock 1, and so on. This
//! makes it possible to summarize everything a replica has integrated as a [`StateVector`], a
//! mapping from client to the next clock that replica expects from it.
//!
//! State vectors are what two replicas exchange to figure out which items the other side is
//! missing (see [`ReadTxn::encode_state_as_update`](crate::ReadTxn::encode_state_as_update)).
use std::{
    collections::{BTreeMap, btree_map},
    fmt,
};

/// Identifies a replica (a single writer) of a document.
pub type ClientId = u64;

/// Globally unique identifier of a single item.
///
/// Ordering is by client first and clock second, which is the order items are encoded in.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
pub struct Id {
    pub client: ClientId,
    pub clock: u64,
}

impl Id {
    pub const fn new(client: ClientId, clock: u64) -> Self {
        Self { client, clock }
    }
}

/// Renders as `client#clock`.
impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.client, self.clock)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Summary of the items a replica has integrated: for each client, the next expected clock.
///
/// Clients that are absent have an implicit clock of 0.
#[derive(Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct StateVector(BTreeMap<ClientId, u64>);

impl fmt::Debug for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl StateVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next clock expected from `client`.
    pub fn get(&self, client: ClientId) -> u64 {
        self.0.get(&client).copied().unwrap_or(0)
    }

    /// Raises the clock of `client` to `clock` if it is higher than the current one.
    pub fn set_max(&mut self, client: ClientId, clock: u64) {
        if clock == 0 {
            return;
        }
        let entry = self.0.entry(client).or_default();
        *entry = (*entry).max(clock);
    }

    /// Returns true if the item with the given id is covered by this state vector.
    pub fn contains(&self, id: &Id) -> bool {
        id.clock < self.get(id.client)
    }

    /// Merges `other` into `self`, keeping the highest clock per client.
    pub fn merge(&mut self, other: &StateVector) {
        for (&client, &clock) in &other.0 {
            self.set_max(client, clock);
        }
    }

    /// Returns true if `self` has seen everything `other` has seen.
    pub fn dominates(&self, other: &StateVector) -> bool {
        other
            .0
            .iter()
            .all(|(&client, &clock)| self.get(client) >= clock)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of clients with a non-zero clock.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(client, next_clock)` pairs in ascending client order.
    pub fn iter(&self) -> btree_map::Iter<'_, ClientId, u64> {
        self.0.iter()
    }
}

impl FromIterator<(ClientId, u64)> for StateVector {
    fn from_iter<T: IntoIterator<Item = (ClientId, u64)>>(iter: T) -> Self {
        let mut sv = StateVector::new();
        for (client, clock) in iter {
            sv.set_max(client, clock);
        }
        sv
    }
}

impl<'a> IntoIterator for &'a StateVector {
    type Item = (&'a ClientId, &'a u64);
    type IntoIter = btree_map::Iter<'a, ClientId, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_clients_have_clock_zero() {
        let sv = StateVector::new();
        assert_eq!(sv.get(7), 0);
        assert!(!sv.contains(&Id::new(7, 0)));
    }

    #[test]
    fn set_max_never_lowers() {
        let mut sv = StateVector::new();
        sv.set_max(1, 5);
        sv.set_max(1, 3);
        assert_eq!(sv.get(1), 5);
        assert!(sv.contains(&Id::new(1, 4)));
        assert!(!sv.contains(&Id::new(1, 5)));
    }

    #[test]
    fn zero_clocks_are_not_stored() {
        let sv: StateVector = [(1, 0), (2, 3)].into_iter().collect();
        assert_eq!(sv.len(), 1);
    }

    #[test]
    fn dominance() {
        let a: StateVector = [(1, 4), (2, 2)].into_iter().collect();
        let b: StateVector = [(1, 3)].into_iter().collect();
        assert!(a.dominates(&b));
        assert!(!b.dominates(&a));

        let mut c = b.clone();
        c.merge(&a);
        assert_eq!(c, a);
    }

    #[test]
    fn debug_renders_id_compactly() {
        assert_eq!(format!("{:?}", Id::new(3, 14)), "3#14");
    }
}
