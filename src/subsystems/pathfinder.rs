//! Multi-hop rippling path search, spec.md §4.3.2/§9.
//!
//! spec.md §9 calls for replacing an unbounded DFS with a "deterministic
//! best-first search with a max-depth cap (e.g. 6 hops) and a tie-break rule:
//! (delivered_amount desc, hop_count asc, path lexicographic)." This module
//! enumerates simple paths up to the depth cap and applies exactly that
//! tie-break, rather than returning the first path found.

use super::trustgraph::TrustGraph;
use crate::model::Account;
use std::collections::BTreeMap;

pub const MAX_HOPS: usize = 6;

/// A candidate path: `accounts[0] == src`, `accounts.last() == dst`. The
/// issuer may appear as an interior hop (it both sinks and sources the
/// currency without its own trust-line capacity limit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub accounts: Vec<String>,
}

impl Path {
    pub fn hop_count(&self) -> usize {
        self.accounts.len().saturating_sub(1)
    }
}

pub struct PathFinder;

impl PathFinder {
    /// Finds the best path from `src` to `dst` for `(currency, issuer)`
    /// delivering at least `min_received`, constrained by `max_send` on the
    /// source leg. Returns `(path, deliverable_amount)`; deliverable amount
    /// is computed hop-by-hop against live trust-line capacity.
    pub fn find_path(
        graph: &TrustGraph,
        accounts: &BTreeMap<String, Account>,
        src: &str,
        dst: &str,
        currency: &str,
        issuer: &str,
        max_send: i128,
        min_received: i128,
    ) -> Option<(Path, i128)> {
        let mut candidates: Vec<String> = graph.holders_of(currency, issuer, accounts);
        if !candidates.contains(&issuer.to_string()) {
            candidates.push(issuer.to_string());
        }
        candidates.sort();

        let mut found: Vec<(Path, i128)> = Vec::new();
        let mut visited = vec![src.to_string()];
        Self::dfs(
            graph,
            accounts,
            src,
            dst,
            currency,
            issuer,
            max_send,
            &candidates,
            &mut visited,
            &mut found,
        );

        found.retain(|(_, amount)| *amount >= min_received && *amount > 0);
        found.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then(a.0.hop_count().cmp(&b.0.hop_count()))
                .then(a.0.accounts.cmp(&b.0.accounts))
        });
        found.into_iter().next()
    }

    #[allow(clippy::too_many_arguments)]
    fn dfs(
        graph: &TrustGraph,
        accounts: &BTreeMap<String, Account>,
        current: &str,
        dst: &str,
        currency: &str,
        issuer: &str,
        max_send: i128,
        candidates: &[String],
        visited: &mut Vec<String>,
        found: &mut Vec<(Path, i128)>,
    ) {
        if visited.len() - 1 >= MAX_HOPS {
            return;
        }
        if current == dst && visited.len() > 1 {
            let amount = Self::capacity_along(graph, accounts, visited, issuer, max_send);
            found.push((Path { accounts: visited.clone() }, amount));
            return;
        }
        for next in candidates {
            if next == current || visited.contains(next) {
                continue;
            }
            if next != dst && next != issuer && !graph.holders_of(currency, issuer, accounts).contains(next) {
                continue;
            }
            visited.push(next.clone());
            Self::dfs(graph, accounts, next, dst, currency, issuer, max_send, candidates, visited, found);
            visited.pop();
        }
        // Always allow stepping directly to dst if not already covered above.
        if current != dst && !visited.contains(&dst.to_string()) {
            visited.push(dst.to_string());
            Self::dfs(graph, accounts, dst, dst, currency, issuer, max_send, candidates, visited, found);
            visited.pop();
        }
    }

    fn capacity_along(
        graph: &TrustGraph,
        accounts: &BTreeMap<String, Account>,
        path: &[String],
        issuer: &str,
        max_send: i128,
    ) -> i128 {
        let mut capacity = max_send;
        for window in path.windows(2) {
            let (from, to) = (&window[0], &window[1]);
            let send_cap = if from == issuer {
                i128::MAX
            } else {
                accounts.get(from).and_then(|a| a.trust_lines.values().find(|l| &l.issuer == issuer)).map(|l| l.available_to_send()).unwrap_or(0)
            };
            let recv_cap = if to == issuer {
                i128::MAX
            } else {
                accounts.get(to).and_then(|a| a.trust_lines.values().find(|l| &l.issuer == issuer)).map(|l| l.available_to_receive()).unwrap_or(0)
            };
            let _ = graph;
            capacity = capacity.min(send_cap).min(recv_cap);
            if capacity <= 0 {
                return 0;
            }
        }
        capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::trust_line::TrustLine;

    fn account_with_line(addr: &str, issuer: &str, balance: i128, limit: i128) -> Account {
        let mut a = Account::new(addr);
        let mut line = TrustLine::new(addr, "USD", issuer, limit);
        line.balance = balance;
        a.trust_lines.insert(("USD".to_string(), issuer.to_string()), line);
        a
    }

    #[test]
    fn finds_path_through_issuer() {
        let mut accounts = BTreeMap::new();
        accounts.insert("rSrc".to_string(), account_with_line("rSrc", "rIssuer", 500, 1000));
        accounts.insert("rDst".to_string(), account_with_line("rDst", "rIssuer", 0, 1000));
        accounts.insert("rIssuer".to_string(), Account::new("rIssuer"));
        let graph = TrustGraph::build(&accounts);

        let result = PathFinder::find_path(&graph, &accounts, "rSrc", "rDst", "USD", "rIssuer", 1000, 1);
        assert!(result.is_some());
        let (path, amount) = result.unwrap();
        assert_eq!(path.accounts.first().unwrap(), "rSrc");
        assert_eq!(path.accounts.last().unwrap(), "rDst");
        assert_eq!(amount, 500);
    }

    #[test]
    fn no_path_when_receiver_has_no_capacity() {
        let mut accounts = BTreeMap::new();
        accounts.insert("rSrc".to_string(), account_with_line("rSrc", "rIssuer", 500, 1000));
        accounts.insert("rDst".to_string(), account_with_line("rDst", "rIssuer", 1000, 1000));
        accounts.insert("rIssuer".to_string(), Account::new("rIssuer"));
        let graph = TrustGraph::build(&accounts);
        let result = PathFinder::find_path(&graph, &accounts, "rSrc", "rDst", "USD", "rIssuer", 1000, 1);
        assert!(result.is_none());
    }
}
