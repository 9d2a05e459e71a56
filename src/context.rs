//! Flow Context
//!
//! Everything a deposit or withdrawal flow shares with its siblings: the
//! submitter, the read-only chain view, the event channel and the tracker.
//! Cloning is cheap; every field is reference counted.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ContractReader, ReceiptSource, TxRequest, TxSubmitter};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::events::{EventPublisher, PhaseEvent};
use crate::logging::{log_phase_transition, log_wait_finished};
use crate::poll::{poll, PollConfig};
use crate::state_reader::ChainStateReader;
use crate::tracker::BridgeTracker;
use crate::types::{BridgeTransaction, Chain, Phase, Receipt, ReceiptStatus};

/// Poll cadence for each kind of wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTiming {
    /// Receipts of our own submissions
    pub receipt: PollConfig,
    /// The derived L2 deposit
    pub l2_confirm: PollConfig,
    /// Dispute game coverage
    pub prove: PollConfig,
    /// Challenge window
    pub finalize: PollConfig,
}

impl FlowTiming {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            receipt: config.receipt_poll(),
            l2_confirm: config.l2_confirm_poll(),
            prove: config.prove_poll(),
            finalize: config.finalize_poll(),
        }
    }
}

impl Default for FlowTiming {
    fn default() -> Self {
        use std::time::Duration;

        Self {
            receipt: PollConfig::fast(Duration::from_secs(4)),
            l2_confirm: PollConfig::fast(Duration::from_secs(4))
                .with_max_wait(Duration::from_secs(600)),
            prove: PollConfig::slow(Duration::from_secs(60)),
            finalize: PollConfig::slow(Duration::from_secs(300)),
        }
    }
}

/// Shared collaborators for bridge flows
#[derive(Clone)]
pub struct BridgeContext {
    submitter: Arc<dyn TxSubmitter>,
    reader: ChainStateReader,
    events: EventPublisher,
    tracker: BridgeTracker,
    portal: Address,
    timing: FlowTiming,
}

impl BridgeContext {
    pub fn new(
        submitter: Arc<dyn TxSubmitter>,
        receipts: Arc<dyn ReceiptSource>,
        contracts: Arc<dyn ContractReader>,
        portal: Address,
    ) -> Self {
        Self {
            submitter,
            reader: ChainStateReader::new(receipts, contracts),
            events: EventPublisher::default(),
            tracker: BridgeTracker::default(),
            portal,
            timing: FlowTiming::default(),
        }
    }

    /// Build a context with the portal, game search depth and cadences of `config`
    pub fn from_config(
        config: &BridgeConfig,
        submitter: Arc<dyn TxSubmitter>,
        receipts: Arc<dyn ReceiptSource>,
        contracts: Arc<dyn ContractReader>,
    ) -> Self {
        let mut ctx = Self::new(submitter, receipts, contracts, config.portal);
        ctx.reader = ctx.reader.with_game_search_depth(config.game_search_depth);
        ctx.timing = FlowTiming::from_config(config);
        ctx
    }

    pub fn with_events(mut self, events: EventPublisher) -> Self {
        self.events = events;
        self
    }

    pub fn with_tracker(mut self, tracker: BridgeTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn with_timing(mut self, timing: FlowTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn reader(&self) -> &ChainStateReader {
        &self.reader
    }

    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    pub fn tracker(&self) -> &BridgeTracker {
        &self.tracker
    }

    pub fn portal(&self) -> Address {
        self.portal
    }

    pub fn timing(&self) -> &FlowTiming {
        &self.timing
    }

    /// Sign and broadcast, classifying failures for the request's chain
    pub(crate) async fn submit(&self, tx_id: &str, request: TxRequest) -> Result<B256> {
        let chain = request.chain();
        let name = request.name();

        match self.submitter.sign_and_send(chain, request).await {
            Ok(hash) => {
                info!(
                    target: "opbridge::submit",
                    tx_id,
                    chain = %chain,
                    request = name,
                    hash = %hash,
                    "submitted"
                );
                Ok(hash)
            }
            Err(e) => {
                warn!(
                    target: "opbridge::submit",
                    tx_id,
                    chain = %chain,
                    request = name,
                    error = %e,
                    "submission failed"
                );
                Err(e.into_bridge(chain))
            }
        }
    }

    /// Wait for a receipt; a reverted receipt is an error
    pub(crate) async fn wait_receipt(
        &self,
        tx_id: &str,
        chain: Chain,
        hash: B256,
        config: &PollConfig,
        cancel: &CancellationToken,
    ) -> Result<Receipt> {
        let what = format!("{chain} receipt {hash}");
        let reader = &self.reader;
        let started = Instant::now();

        let result = poll(&what, config, cancel, || async move {
            Ok::<_, BridgeError>(match reader.get_receipt(chain, hash).await? {
                ReceiptStatus::Found(receipt) => Some(receipt),
                ReceiptStatus::Pending => None,
            })
        })
        .await;

        log_wait_finished(
            &what,
            tx_id,
            started.elapsed().as_millis() as u64,
            match &result {
                Ok(_) => "found",
                Err(e) => e.error_code(),
            },
        );

        let receipt = result?;
        if receipt.reverted() {
            return Err(BridgeError::reverted(chain, hash));
        }
        debug!(
            target: "opbridge::poll",
            tx_id,
            chain = %chain,
            block = receipt.block_number,
            "receipt confirmed"
        );
        Ok(receipt)
    }

    /// Log, broadcast and record a phase change
    pub(crate) async fn publish(&self, tx: &BridgeTransaction, from: Phase) {
        log_phase_transition(tx, from, tx.phase);
        self.events
            .publish(PhaseEvent::new(tx.id.clone(), tx.direction, from, tx.phase));
        self.snapshot(tx).await;
    }

    /// Record the current state without a phase change
    pub(crate) async fn snapshot(&self, tx: &BridgeTransaction) {
        if let Err(e) = self.tracker.record(tx).await {
            warn!(target: "opbridge::tracker", tx_id = %tx.id, error = %e, "snapshot not recorded");
        }
    }
}
