//! Payment channel sub-engine, spec.md §4.3.4 ("Payment channel family").

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: u64,
    pub creator: String,
    pub destination: String,
    /// Total funds allocated into the channel.
    pub allocation: i128,
    /// Amount already claimed by the destination.
    pub claimed: i128,
    pub settle_delay: i64,
    /// Set once `PayChanClose` is called by the creator; claims are still
    /// honoured until `closed_at + settle_delay`.
    pub closed_at: Option<i64>,
}

impl Channel {
    pub fn remaining(&self) -> i128 {
        self.allocation - self.claimed
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelManager {
    channels: BTreeMap<u64, Channel>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, channel: Channel) -> Result<(), String> {
        if self.channels.contains_key(&channel.id) {
            return Err("channel id already exists".to_string());
        }
        self.channels.insert(channel.id, channel);
        Ok(())
    }

    pub fn fund(&mut self, id: u64, amount: i128) -> Result<(), String> {
        let channel = self.channels.get_mut(&id).ok_or_else(|| "no such channel".to_string())?;
        channel.allocation += amount;
        Ok(())
    }

    /// Claims up to `new_balance` total (cumulative, per the XRPL-style
    /// incremental-claim pattern): returns the incremental payout.
    pub fn claim(&mut self, id: u64, new_balance: i128) -> Result<i128, String> {
        let channel = self.channels.get_mut(&id).ok_or_else(|| "no such channel".to_string())?;
        if new_balance <= channel.claimed {
            return Err("claim balance must increase".to_string());
        }
        if new_balance > channel.allocation {
            return Err("claim exceeds allocation".to_string());
        }
        let delta = new_balance - channel.claimed;
        channel.claimed = new_balance;
        Ok(delta)
    }

    /// Closes the channel, returning the remainder owed to the creator once
    /// `settle_delay` has elapsed since closing.
    pub fn close(&mut self, id: u64, now: i64) -> Result<i128, String> {
        let channel = self.channels.get(&id).ok_or_else(|| "no such channel".to_string())?.clone();
        match channel.closed_at {
            None => {
                self.channels.get_mut(&id).unwrap().closed_at = Some(now);
                Err("settle delay started".to_string())
            }
            Some(closed_at) if now >= closed_at + channel.settle_delay => {
                let remainder = channel.remaining();
                self.channels.remove(&id);
                Ok(remainder)
            }
            Some(_) => Err("settle delay not yet elapsed".to_string()),
        }
    }

    pub fn get(&self, id: u64) -> Option<&Channel> {
        self.channels.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }
}
