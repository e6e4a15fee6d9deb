//! Order book sub-engine, spec.md §4.3.3.
//!
//! Grounded on `src/ledger.rs::LedgerState::apply_certificate`'s
//! `Result<(), String>` manager-boundary pattern, generalized to a matching
//! engine. Price-time priority, deterministic iteration (offers are kept
//! sorted by `(price, time_priority)`, never by hash-map order).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till cancelled: unfilled remainder rests on the book.
    Gtc,
    /// Immediate or cancel: unfilled remainder is discarded.
    Ioc,
    /// Fill or kill: if it cannot fill completely, nothing fills.
    Fok,
}

/// A resting or incoming order. `price` is counter-per-base, in billionths
/// (see [`crate::model::amount::RATE_ONE`]) so two validators compare prices
/// with integer arithmetic. `base`/`counter` must already be canonicalized
/// by the caller (the same asset pair always named in the same order) so
/// that reciprocal offers land in the same [`Book`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: u64,
    pub account: String,
    pub base: (String, String),
    pub counter: (String, String),
    pub side: Side,
    pub price_billionths: u128,
    pub quantity: i128,
    pub time_priority: u64,
    pub tif: TimeInForce,
}

/// One matched trade: `quantity` base units change hands at `price`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub maker_offer_id: u64,
    pub maker_account: String,
    pub taker_account: String,
    pub quantity: i128,
    pub price_billionths: u128,
}

/// One order book per `(base, counter)` asset pair. Bids and asks are kept
/// sorted so matching never depends on insertion or hash-map order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Book {
    /// Best bid first: price descending, then time ascending.
    bids: Vec<Offer>,
    /// Best ask first: price ascending, then time ascending.
    asks: Vec<Offer>,
}

impl Book {
    fn sort_bids(bids: &mut Vec<Offer>) {
        bids.sort_by(|a, b| {
            b.price_billionths
                .cmp(&a.price_billionths)
                .then(a.time_priority.cmp(&b.time_priority))
        });
    }

    fn sort_asks(asks: &mut Vec<Offer>) {
        asks.sort_by(|a, b| {
            a.price_billionths
                .cmp(&b.price_billionths)
                .then(a.time_priority.cmp(&b.time_priority))
        });
    }
}

/// All order books, keyed by the asset pair `(base, counter)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    books: BTreeMap<(String, String), Book>,
    next_offer_id: u64,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_offer_id(&mut self) -> u64 {
        self.next_offer_id += 1;
        self.next_offer_id
    }

    /// Submits an order for matching. Returns the fills that occurred and,
    /// if `tif` is GTC and quantity remains, the resting remainder.
    /// `FOK` orders that cannot fully fill return no fills and no
    /// remainder (caller should treat this as a no-op cancel).
    pub fn submit(&mut self, mut incoming: Offer) -> (Vec<Fill>, Option<Offer>) {
        let pair = (incoming.base.clone(), incoming.counter.clone());
        let book = self.books.entry(pair).or_default();

        if incoming.tif == TimeInForce::Fok {
            let fillable = Self::fillable_quantity(book, &incoming);
            if fillable < incoming.quantity {
                return (Vec::new(), None);
            }
        }

        let mut fills = Vec::new();
        match incoming.side {
            Side::Buy => {
                while incoming.quantity > 0 {
                    let Some(best) = book.asks.first().cloned() else { break };
                    if best.price_billionths > incoming.price_billionths {
                        break;
                    }
                    let traded = incoming.quantity.min(best.quantity);
                    fills.push(Fill {
                        maker_offer_id: best.offer_id,
                        maker_account: best.account.clone(),
                        taker_account: incoming.account.clone(),
                        quantity: traded,
                        price_billionths: best.price_billionths,
                    });
                    incoming.quantity -= traded;
                    book.asks[0].quantity -= traded;
                    if book.asks[0].quantity == 0 {
                        book.asks.remove(0);
                    }
                }
            }
            Side::Sell => {
                while incoming.quantity > 0 {
                    let Some(best) = book.bids.first().cloned() else { break };
                    if best.price_billionths < incoming.price_billionths {
                        break;
                    }
                    let traded = incoming.quantity.min(best.quantity);
                    fills.push(Fill {
                        maker_offer_id: best.offer_id,
                        maker_account: best.account.clone(),
                        taker_account: incoming.account.clone(),
                        quantity: traded,
                        price_billionths: best.price_billionths,
                    });
                    incoming.quantity -= traded;
                    book.bids[0].quantity -= traded;
                    if book.bids[0].quantity == 0 {
                        book.bids.remove(0);
                    }
                }
            }
        }

        let remainder = if incoming.quantity > 0 && incoming.tif == TimeInForce::Gtc {
            let rest = incoming.clone();
            match rest.side {
                Side::Buy => {
                    book.bids.push(rest.clone());
                    Book::sort_bids(&mut book.bids);
                }
                Side::Sell => {
                    book.asks.push(rest.clone());
                    Book::sort_asks(&mut book.asks);
                }
            }
            Some(rest)
        } else {
            None
        };

        (fills, remainder)
    }

    fn fillable_quantity(book: &Book, incoming: &Offer) -> i128 {
        let mut remaining_needed = incoming.quantity;
        let mut available = 0i128;
        match incoming.side {
            Side::Buy => {
                for ask in &book.asks {
                    if ask.price_billionths > incoming.price_billionths || remaining_needed <= 0 {
                        break;
                    }
                    let take = remaining_needed.min(ask.quantity);
                    available += take;
                    remaining_needed -= take;
                }
            }
            Side::Sell => {
                for bid in &book.bids {
                    if bid.price_billionths < incoming.price_billionths || remaining_needed <= 0 {
                        break;
                    }
                    let take = remaining_needed.min(bid.quantity);
                    available += take;
                    remaining_needed -= take;
                }
            }
        }
        available
    }

    /// Best-effort cancel: returns `true` if a matching resting offer owned
    /// by `account` was removed. A missing offer is not an error, per
    /// spec.md §4.3.3.
    pub fn cancel(&mut self, account: &str, offer_id: u64) -> bool {
        for book in self.books.values_mut() {
            if let Some(pos) = book.bids.iter().position(|o| o.offer_id == offer_id && o.account == account) {
                book.bids.remove(pos);
                return true;
            }
            if let Some(pos) = book.asks.iter().position(|o| o.offer_id == offer_id && o.account == account) {
                book.asks.remove(pos);
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (String, String) {
        (("XRP".into(), "".into()), ("USD".into(), "rIssuer".into()))
    }

    #[test]
    fn crossing_orders_fill_at_resting_price() {
        let mut ob = OrderBook::new();
        let (base, counter) = pair();
        let ask = Offer {
            offer_id: 1,
            account: "rMaker".into(),
            base: base.clone(),
            counter: counter.clone(),
            side: Side::Sell,
            price_billionths: 2_000_000_000,
            quantity: 100,
            time_priority: 1,
            tif: TimeInForce::Gtc,
        };
        let (fills, rest) = ob.submit(ask);
        assert!(fills.is_empty());
        assert!(rest.is_some());

        let bid = Offer {
            offer_id: 2,
            account: "rTaker".into(),
            base,
            counter,
            side: Side::Buy,
            price_billionths: 2_500_000_000,
            quantity: 40,
            time_priority: 2,
            tif: TimeInForce::Gtc,
        };
        let (fills, rest) = ob.submit(bid);
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price_billionths, 2_000_000_000);
        assert_eq!(fills[0].quantity, 40);
        assert!(rest.is_none());
    }

    #[test]
    fn fok_with_insufficient_liquidity_fills_nothing() {
        let mut ob = OrderBook::new();
        let (base, counter) = pair();
        let bid = Offer {
            offer_id: 10,
            account: "rTaker".into(),
            base,
            counter,
            side: Side::Buy,
            price_billionths: RATE_ONE_FOR_TEST,
            quantity: 100,
            time_priority: 1,
            tif: TimeInForce::Fok,
        };
        let (fills, rest) = ob.submit(bid);
        assert!(fills.is_empty());
        assert!(rest.is_none());
    }

    const RATE_ONE_FOR_TEST: u128 = 1_000_000_000;

    #[test]
    fn cancel_missing_offer_is_not_an_error() {
        let mut ob = OrderBook::new();
        assert!(!ob.cancel("rAlice", 999));
    }
}
