//! Name-keyed observation hook for ledger state changes.
//!
//! The ledger holds an [`EventBus`] as a capability and publishes to it after
//! each state change.  Publishing is best effort: the ledger never reads
//! anything back, so a bus cannot influence whether a token or transaction is
//! accepted.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Published after a token is minted.
pub const TOKEN_MINTED: &str = "token.minted";
/// Published after a transaction is appended to a token.
pub const TRANSACTION_APPENDED: &str = "transaction.appended";
/// Published when an append is refused.
pub const TRANSACTION_REJECTED: &str = "transaction.rejected";

/// Payload delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A new token exists.
    TokenMinted {
        /// Identifier of the token.
        token_id: BigUint,
        /// Minter's public value.
        pub_key: BigUint,
        /// Face value.
        value: u64,
    },
    /// A transaction joined a token's chain.
    TransactionAppended {
        /// Identifier of the token.
        token_id: BigUint,
        /// Identifier of the new transaction.
        tx_id: BigUint,
    },
    /// An append was refused.
    TransactionRejected {
        /// Identifier of the token.
        token_id: BigUint,
        /// Rendered rejection reason.
        reason: String,
    },
}

/// Callback invoked with each published event.
pub type EventHandler = Arc<dyn Fn(&LedgerEvent) + Send + Sync>;

/// Subscribe/publish facility keyed by event name.
pub trait EventBus: Send + Sync {
    /// Registers `handler` for every later publish under `name`.
    fn subscribe(&self, name: &str, handler: EventHandler);

    /// Delivers `event` to the handlers registered under `name`.
    fn publish(&self, name: &str, event: &LedgerEvent);
}

/// In-process bus that runs handlers synchronously in registration order.
#[derive(Default)]
pub struct LocalEventBus {
    handlers: RwLock<HashMap<String, Vec<EventHandler>>>,
}

impl LocalEventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handlers registered under `name`.
    pub fn handler_count(&self, name: &str) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(name).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for LocalEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<_> = handlers.keys().collect();
        names.sort();
        f.debug_struct("LocalEventBus").field("events", &names).finish()
    }
}

impl EventBus for LocalEventBus {
    fn subscribe(&self, name: &str, handler: EventHandler) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.entry(name.to_string()).or_default().push(handler);
    }

    fn publish(&self, name: &str, event: &LedgerEvent) {
        // Snapshot so a handler may subscribe without deadlocking.
        let snapshot = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            match handlers.get(name) {
                Some(list) => list.clone(),
                None => return,
            }
        };
        for handler in snapshot {
            handler(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn appended(n: u32) -> LedgerEvent {
        LedgerEvent::TransactionAppended {
            token_id: BigUint::from(1u8),
            tx_id: BigUint::from(n),
        }
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let bus = LocalEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(
                TRANSACTION_APPENDED,
                Arc::new(move |_| seen.lock().unwrap().push(tag)),
            );
        }
        bus.publish(TRANSACTION_APPENDED, &appended(7));
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(bus.handler_count(TRANSACTION_APPENDED), 2);
    }

    #[test]
    fn publish_is_scoped_by_name() {
        let bus = LocalEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bus.subscribe(TOKEN_MINTED, Arc::new(move |e| sink.lock().unwrap().push(e.clone())));
        bus.publish(TRANSACTION_APPENDED, &appended(1));
        bus.publish(TRANSACTION_REJECTED, &appended(2));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(bus.handler_count("unknown"), 0);
    }

    #[test]
    fn handler_may_subscribe_during_publish() {
        let bus = Arc::new(LocalEventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe(
            TOKEN_MINTED,
            Arc::new(move |_| inner.subscribe(TOKEN_MINTED, Arc::new(|_| {}))),
        );
        bus.publish(
            TOKEN_MINTED,
            &LedgerEvent::TokenMinted {
                token_id: BigUint::from(1u8),
                pub_key: BigUint::from(2u8),
                value: 3,
            },
        );
        assert_eq!(bus.handler_count(TOKEN_MINTED), 2);
    }
}
