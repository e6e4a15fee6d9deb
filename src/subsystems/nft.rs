//! NFT sub-engine, spec.md §4.3.4 ("NFT family").

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nft {
    pub id: String,
    pub owner: String,
    pub uri: String,
    pub transfer_fee_bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftOffer {
    pub offer_id: u64,
    pub nft_id: String,
    pub owner: String,
    pub amount: i128,
    pub is_sell_offer: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NftManager {
    tokens: BTreeMap<String, Nft>,
    offers: BTreeMap<u64, NftOffer>,
}

impl NftManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&mut self, nft: Nft) -> Result<(), String> {
        if self.tokens.contains_key(&nft.id) {
            return Err("nft already exists".to_string());
        }
        self.tokens.insert(nft.id.clone(), nft);
        Ok(())
    }

    pub fn burn(&mut self, id: &str, owner: &str) -> Result<(), String> {
        let nft = self.tokens.get(id).ok_or_else(|| "no such nft".to_string())?;
        if nft.owner != owner {
            return Err("not the owner".to_string());
        }
        self.tokens.remove(id);
        self.offers.retain(|_, o| o.nft_id != id);
        Ok(())
    }

    pub fn offer_create(&mut self, offer: NftOffer) -> Result<(), String> {
        if !self.tokens.contains_key(&offer.nft_id) {
            return Err("no such nft".to_string());
        }
        if self.offers.contains_key(&offer.offer_id) {
            return Err("offer id already exists".to_string());
        }
        self.offers.insert(offer.offer_id, offer);
        Ok(())
    }

    /// Accepts an offer, transferring ownership. Returns
    /// `(seller, buyer, amount)` so the caller can settle native payment.
    pub fn offer_accept(&mut self, offer_id: u64, acceptor: &str) -> Result<(String, String, i128), String> {
        let offer = self.offers.remove(&offer_id).ok_or_else(|| "no such offer".to_string())?;
        let nft = self.tokens.get_mut(&offer.nft_id).ok_or_else(|| "no such nft".to_string())?;
        let (seller, buyer) = if offer.is_sell_offer {
            (offer.owner.clone(), acceptor.to_string())
        } else {
            (acceptor.to_string(), offer.owner.clone())
        };
        if nft.owner != seller {
            return Err("seller does not own nft".to_string());
        }
        nft.owner = buyer.clone();
        self.offers.retain(|_, o| o.nft_id != offer.nft_id);
        Ok((seller, buyer, offer.amount))
    }

    pub fn offer_cancel(&mut self, offer_id: u64) -> bool {
        self.offers.remove(&offer_id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&Nft> {
        self.tokens.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepting_sell_offer_transfers_ownership() {
        let mut mgr = NftManager::new();
        mgr.mint(Nft { id: "nft1".into(), owner: "rSeller".into(), uri: "ipfs://x".into(), transfer_fee_bps: 0 }).unwrap();
        mgr.offer_create(NftOffer { offer_id: 1, nft_id: "nft1".into(), owner: "rSeller".into(), amount: 500, is_sell_offer: true }).unwrap();
        let (seller, buyer, amount) = mgr.offer_accept(1, "rBuyer").unwrap();
        assert_eq!(seller, "rSeller");
        assert_eq!(buyer, "rBuyer");
        assert_eq!(amount, 500);
        assert_eq!(mgr.get("nft1").unwrap().owner, "rBuyer");
    }

    #[test]
    fn burn_requires_ownership() {
        let mut mgr = NftManager::new();
        mgr.mint(Nft { id: "nft1".into(), owner: "rSeller".into(), uri: "x".into(), transfer_fee_bps: 0 }).unwrap();
        assert!(mgr.burn("nft1", "rOther").is_err());
        assert!(mgr.burn("nft1", "rSeller").is_ok());
    }
}
