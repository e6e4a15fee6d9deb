//! Structured trace events for the validator core.
//!
//! Grounded on the teacher's `tracing::tracers` module: a `Tracer` that fans
//! events out to registered handlers, and a `TraceEvent` enum describing
//! everything worth observing. The catalogue here is narrowed to this
//! domain's concerns (ledger/consensus), dropping the teacher's P2P/Diffusion
//! variants which belong to the out-of-scope transport layer.

use std::sync::{Arc, Mutex};

/// Structured trace events for the validator core.
#[derive(Debug, Clone)]
pub enum TraceEvent {
    LedgerClosed { sequence: u64, hash: String },
    TxApplied { tx_id: String, result: String },
    TxRejected { tx_id: String, result: String },
    InvariantViolation { tx_id: String, detail: String },
    ConsensusRoundStarted { ledger_seq: u64, round: u32 },
    ConsensusRoundResult { ledger_seq: u64, round: u32, agreed_count: usize },
    Equivocation { validator_id: String },
    ByzantineQuarantine { validator_id: String },
    NegativeUnlChanged { validator_id: String, added: bool },
    Config(String),
    Error(String),
    Warning(String),
    Info(String),
    Debug(String),
    Custom(String),
}

impl TraceEvent {
    /// A human-readable description, used by the default `tracing`-crate sink.
    pub fn description(&self) -> String {
        match self {
            TraceEvent::LedgerClosed { sequence, hash } => {
                format!("ledger closed: seq={} hash={}", sequence, hash)
            }
            TraceEvent::TxApplied { tx_id, result } => {
                format!("tx applied: {} -> {}", tx_id, result)
            }
            TraceEvent::TxRejected { tx_id, result } => {
                format!("tx rejected: {} -> {}", tx_id, result)
            }
            TraceEvent::InvariantViolation { tx_id, detail } => {
                format!("invariant violation on {}: {}", tx_id, detail)
            }
            TraceEvent::ConsensusRoundStarted { ledger_seq, round } => {
                format!("consensus round started: seq={} round={}", ledger_seq, round)
            }
            TraceEvent::ConsensusRoundResult { ledger_seq, round, agreed_count } => format!(
                "consensus round result: seq={} round={} agreed={}",
                ledger_seq, round, agreed_count
            ),
            TraceEvent::Equivocation { validator_id } => {
                format!("equivocation detected: {}", validator_id)
            }
            TraceEvent::ByzantineQuarantine { validator_id } => {
                format!("validator quarantined (byzantine): {}", validator_id)
            }
            TraceEvent::NegativeUnlChanged { validator_id, added } => format!(
                "negative UNL {}: {}",
                if *added { "added" } else { "removed" },
                validator_id
            ),
            TraceEvent::Config(msg) => format!("config: {}", msg),
            TraceEvent::Error(msg) => format!("error: {}", msg),
            TraceEvent::Warning(msg) => format!("warning: {}", msg),
            TraceEvent::Info(msg) => format!("info: {}", msg),
            TraceEvent::Debug(msg) => format!("debug: {}", msg),
            TraceEvent::Custom(msg) => format!("custom: {}", msg),
        }
    }
}

/// Tracer type for emitting trace events to registered handlers.
#[derive(Clone, Default)]
pub struct Tracer {
    handlers: Arc<Mutex<Vec<Box<dyn Fn(&TraceEvent) + Send + Sync>>>>,
}

impl Tracer {
    /// Emits a trace event to all registered handlers.
    pub fn trace(&self, event: TraceEvent) {
        let handlers = self.handlers.lock().unwrap();
        for handler in handlers.iter() {
            handler(&event);
        }
    }

    /// Registers a new handler for trace events.
    pub fn register_tracer<T: Fn(&TraceEvent) + Send + Sync + 'static>(&self, handler: T) {
        self.handlers.lock().unwrap().push(Box::new(handler));
    }

    /// Registers a handler that forwards events to the `tracing` crate at an
    /// appropriate level.
    pub fn register_tracing_bridge(&self) {
        self.register_tracer(|event| match event {
            TraceEvent::Error(_) | TraceEvent::InvariantViolation { .. } => {
                tracing::error!("{}", event.description())
            }
            TraceEvent::Warning(_) | TraceEvent::Equivocation { .. } | TraceEvent::ByzantineQuarantine { .. } => {
                tracing::warn!("{}", event.description())
            }
            TraceEvent::Debug(_) => tracing::debug!("{}", event.description()),
            _ => tracing::info!("{}", event.description()),
        });
    }

    #[cfg(test)]
    pub fn clear_handlers(&self) {
        self.handlers.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn handlers_receive_events() {
        let tracer = Tracer::default();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        tracer.register_tracer(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        tracer.trace(TraceEvent::Info("hello".to_string()));
        tracer.trace(TraceEvent::LedgerClosed { sequence: 1, hash: "x".to_string() });
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn clear_handlers_stops_delivery() {
        let tracer = Tracer::default();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        tracer.register_tracer(move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        tracer.clear_handlers();
        tracer.trace(TraceEvent::Info("hello".to_string()));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
