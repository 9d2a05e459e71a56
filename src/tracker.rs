//! Bridge Tracker
//!
//! In-memory registry of bridge transaction snapshots. Flows own their
//! transaction and push a copy here after every phase change so that
//! observers can list what is in flight. A full tracker makes room by
//! dropping its oldest terminal snapshot; only active transactions count
//! against the limit once nothing terminal is left.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::{BridgeTransaction, Direction};

/// Shared registry of bridge transactions
#[derive(Clone)]
pub struct BridgeTracker {
    /// Snapshots by transaction ID
    transactions: Arc<RwLock<HashMap<String, BridgeTransaction>>>,
    /// Maximum number of tracked transactions
    max_size: usize,
}

impl BridgeTracker {
    pub fn new(max_size: usize) -> Self {
        Self {
            transactions: Arc::new(RwLock::new(HashMap::new())),
            max_size,
        }
    }

    /// Register a new transaction, evicting a terminal one when full
    pub async fn add(&self, tx: BridgeTransaction) -> Result<String, TrackerError> {
        let mut transactions = self.transactions.write().await;

        if transactions.contains_key(&tx.id) {
            return Err(TrackerError::Duplicate(tx.id.clone()));
        }
        self.make_room(&mut transactions)?;

        let id = tx.id.clone();
        transactions.insert(id.clone(), tx);
        Ok(id)
    }

    /// Insert or replace a snapshot
    pub async fn record(&self, tx: &BridgeTransaction) -> Result<(), TrackerError> {
        let mut transactions = self.transactions.write().await;

        if !transactions.contains_key(&tx.id) {
            self.make_room(&mut transactions)?;
        }

        transactions.insert(tx.id.clone(), tx.clone());
        Ok(())
    }

    fn make_room(
        &self,
        transactions: &mut HashMap<String, BridgeTransaction>,
    ) -> Result<(), TrackerError> {
        if transactions.len() < self.max_size {
            return Ok(());
        }
        let oldest = transactions
            .values()
            .filter(|t| t.phase.is_terminal())
            .min_by_key(|t| t.updated_at)
            .map(|t| t.id.clone())
            .ok_or(TrackerError::Full)?;

        debug!(target: "opbridge::tracker", tx_id = %oldest, "evicting terminal snapshot");
        transactions.remove(&oldest);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Option<BridgeTransaction> {
        self.transactions.read().await.get(id).cloned()
    }

    /// All transactions in one direction
    pub async fn get_by_direction(&self, direction: Direction) -> Vec<BridgeTransaction> {
        self.transactions
            .read()
            .await
            .values()
            .filter(|t| t.direction == direction)
            .cloned()
            .collect()
    }

    /// Transactions not yet in a terminal phase
    pub async fn get_active(&self) -> Vec<BridgeTransaction> {
        self.transactions
            .read()
            .await
            .values()
            .filter(|t| !t.phase.is_terminal())
            .cloned()
            .collect()
    }

    pub async fn get_failed(&self) -> Vec<BridgeTransaction> {
        self.transactions
            .read()
            .await
            .values()
            .filter(|t| t.phase.is_failed())
            .cloned()
            .collect()
    }

    pub async fn get_all(&self) -> Vec<BridgeTransaction> {
        self.transactions.read().await.values().cloned().collect()
    }

    pub async fn remove(&self, id: &str) -> Option<BridgeTransaction> {
        self.transactions.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transactions.read().await.is_empty()
    }

    /// Get statistics
    pub async fn stats(&self) -> TrackerStats {
        let transactions = self.transactions.read().await;
        let all = transactions.values();

        let mut stats = TrackerStats {
            total: transactions.len(),
            ..Default::default()
        };
        for t in all {
            match t.direction {
                Direction::DepositL1ToL2 => stats.deposits += 1,
                Direction::WithdrawalL2ToL1 => stats.withdrawals += 1,
            }
            if t.phase.is_complete() {
                stats.completed += 1;
            } else if t.phase.is_failed() {
                stats.failed += 1;
            } else {
                stats.active += 1;
            }
            if t.cancelled {
                stats.cancelled += 1;
            }
        }
        stats
    }
}

impl Default for BridgeTracker {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Tracker statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub total: usize,
    pub deposits: usize,
    pub withdrawals: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    /// Active transactions whose last wait was cancelled
    pub cancelled: usize,
}

impl std::fmt::Display for TrackerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bridge: {} total ({} deposits, {} withdrawals) | active: {} | completed: {} | failed: {} | cancelled: {}",
            self.total,
            self.deposits,
            self.withdrawals,
            self.active,
            self.completed,
            self.failed,
            self.cancelled
        )
    }
}

/// Tracker errors
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker is full")]
    Full,

    #[error("transaction already tracked: {0}")]
    Duplicate(String),
}
