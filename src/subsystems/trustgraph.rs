//! Trust graph snapshot, spec.md §4.3.2 step 1.
//!
//! A read-only view of the ledger's trust lines built fresh for each
//! rippling attempt. Sub-engines hold no owning references to accounts
//! (spec.md §9 "cyclic manager references -> arena/indices"); this is a
//! value snapshot, not a back-reference. Native-asset bridging legs (spec.md
//! §4.3.2 step 2's optional NXF pivot) are not modelled; only IOU trust-line
//! hops are searched (see SPEC_FULL.md).

use crate::model::Account;
use std::collections::BTreeMap;

/// One directed edge: `from` can forward `currency` issued by `issuer` on to
/// whoever is next in a path, up to `capacity` micro-units.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: String,
    pub currency: String,
    pub issuer: String,
    pub capacity: i128,
    pub quality_out: u32,
    pub quality_in: u32,
}

/// A snapshot of accounts and their trust-line capacities, indexed for
/// path search.
#[derive(Debug, Clone, Default)]
pub struct TrustGraph {
    /// `address -> [edges originating at that address]`, sorted by
    /// `(currency, issuer)` for deterministic iteration.
    edges: BTreeMap<String, Vec<Edge>>,
}

impl TrustGraph {
    /// Builds a snapshot from the ledger's current accounts.
    pub fn build(accounts: &BTreeMap<String, Account>) -> Self {
        let mut edges: BTreeMap<String, Vec<Edge>> = BTreeMap::new();
        for (addr, account) in accounts {
            let mut out_edges: Vec<Edge> = account
                .trust_lines
                .values()
                .filter(|line| !line.flags.frozen())
                .map(|line| Edge {
                    from: addr.clone(),
                    currency: line.currency.clone(),
                    issuer: line.issuer.clone(),
                    capacity: line.available_to_send(),
                    quality_out: line.quality_out,
                    quality_in: line.quality_in,
                })
                .collect();
            out_edges.sort_by(|a, b| (&a.currency, &a.issuer).cmp(&(&b.currency, &b.issuer)));
            edges.insert(addr.clone(), out_edges);
        }
        Self { edges }
    }

    pub fn edges_from(&self, address: &str) -> &[Edge] {
        self.edges.get(address).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Accounts holding a trust line `(currency, issuer)` with remaining
    /// receive capacity, i.e. candidate next hops. Sorted lexicographically
    /// by address for deterministic search order.
    pub fn holders_of(&self, currency: &str, issuer: &str, accounts: &BTreeMap<String, Account>) -> Vec<String> {
        let mut out: Vec<String> = accounts
            .iter()
            .filter(|(_, acc)| {
                acc.trust_line(currency, issuer)
                    .map(|l| !l.flags.frozen() && l.available_to_receive() > 0)
                    .unwrap_or(false)
            })
            .map(|(addr, _)| addr.clone())
            .collect();
        out.sort();
        out
    }
}
