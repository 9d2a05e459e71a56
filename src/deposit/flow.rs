//! Deposit state machine

use alloy_primitives::{Address, Bytes, U256};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::TxRequest;
use crate::context::BridgeContext;
use crate::derivation::derive_l2_hash;
use crate::error::{BridgeError, Result};
use crate::logging::log_deposit_event;
use crate::types::{
    wei_to_display, BridgeOutcome, BridgeTransaction, Chain, DepositPhase, Direction, Phase,
    Receipt,
};

/// L2 gas limit of the deposited transaction when none is given
pub const DEFAULT_DEPOSIT_GAS_LIMIT: u64 = 100_000;

/// What to deposit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositParams {
    /// Wei minted on L2, sent as L1 msg.value
    pub amount: U256,
    /// L2 recipient, the submitting account when unset
    pub recipient: Option<Address>,
    pub gas_limit: u64,
    pub data: Bytes,
}

impl DepositParams {
    pub fn new(amount: U256) -> Self {
        Self {
            amount,
            recipient: None,
            gas_limit: DEFAULT_DEPOSIT_GAS_LIMIT,
            data: Bytes::new(),
        }
    }

    pub fn to(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_data(mut self, data: Bytes) -> Self {
        self.data = data;
        self
    }
}

/// Drives one deposit from L1 submission to L2 confirmation
pub struct DepositFlow {
    ctx: BridgeContext,
    account: Address,
    params: DepositParams,
    tx: BridgeTransaction,
    /// Confirmed L1 receipt, kept between the confirm and derive steps
    l1_receipt: Option<Receipt>,
    cancel: CancellationToken,
}

impl DepositFlow {
    /// Start a new deposit from `account`
    pub fn new(ctx: BridgeContext, account: Address, params: DepositParams) -> Self {
        let recipient = params.recipient.unwrap_or(account);
        let tx = BridgeTransaction::new_deposit(params.amount, recipient);

        Self {
            ctx,
            account,
            params,
            tx,
            l1_receipt: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Continue a deposit from its recorded phase
    pub fn resume(
        ctx: BridgeContext,
        account: Address,
        params: DepositParams,
        tx: BridgeTransaction,
    ) -> Result<Self> {
        if tx.direction != Direction::DepositL1ToL2 {
            return Err(BridgeError::InvalidTransition {
                from: tx.phase.to_string(),
                to: "deposit flow".to_string(),
            });
        }

        Ok(Self {
            ctx,
            account,
            params,
            tx,
            l1_receipt: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned cancellation token
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn transaction(&self) -> &BridgeTransaction {
        &self.tx
    }

    pub fn into_transaction(self) -> BridgeTransaction {
        self.tx
    }

    pub fn phase(&self) -> DepositPhase {
        self.tx.deposit_phase().unwrap_or(DepositPhase::Created)
    }

    /// Run until the deposit is confirmed on L2 or fails.
    ///
    /// `Timeout` and `Cancelled` leave the phase untouched; calling `run`
    /// again resumes the interrupted wait without resubmitting.
    pub async fn run(&mut self) -> Result<BridgeOutcome> {
        self.ctx.snapshot(&self.tx).await;
        if self.phase() == DepositPhase::Created {
            self.preflight().await;
        }

        while !self.tx.phase.is_terminal() {
            self.step().await?;
        }

        let outcome = self.tx.outcome();
        if outcome.success {
            log_deposit_event("deposit_completed", &self.tx, true, None);
        }
        Ok(outcome)
    }

    /// Perform exactly one transition
    pub async fn step(&mut self) -> Result<DepositPhase> {
        let result = match self.phase() {
            DepositPhase::Created => self.submit().await,
            DepositPhase::SubmittedL1 => self.confirm_l1().await,
            DepositPhase::ConfirmedL1 => self.derive().await,
            DepositPhase::DerivedL2Hash => self.confirm_l2().await,
            DepositPhase::ConfirmedL2 | DepositPhase::FailedL1 | DepositPhase::FailedL2 => {
                return Ok(self.phase())
            }
        };

        match result {
            Ok(next) => {
                let from = self.tx.advance(Phase::Deposit(next))?;
                self.ctx.publish(&self.tx, from).await;
                Ok(next)
            }
            Err(e) => Err(self.handle_error(e).await),
        }
    }

    /// Balance check, informational only
    async fn preflight(&self) {
        match self.ctx.reader().get_balance(Chain::L1, self.account).await {
            Ok(balance) => {
                info!(
                    target: "opbridge::deposit",
                    tx_id = %self.tx.id,
                    account = %self.account,
                    "L1 balance: {}",
                    wei_to_display(balance)
                );
                if balance < self.params.amount {
                    warn!(
                        target: "opbridge::deposit",
                        tx_id = %self.tx.id,
                        "L1 balance is below the deposit amount {}",
                        wei_to_display(self.params.amount)
                    );
                }
            }
            Err(e) => {
                warn!(
                    target: "opbridge::deposit",
                    tx_id = %self.tx.id,
                    error = %e,
                    "L1 balance unavailable"
                );
            }
        }
    }

    async fn submit(&mut self) -> Result<DepositPhase> {
        let request = TxRequest::Deposit {
            to: self.tx.recipient,
            mint: self.params.amount,
            value: self.params.amount,
            gas_limit: self.params.gas_limit,
            is_creation: false,
            data: self.params.data.clone(),
        };

        let hash = self.ctx.submit(&self.tx.id, request).await?;
        self.tx.set_source_hash(hash)?;
        log_deposit_event("deposit_submitted", &self.tx, true, None);
        Ok(DepositPhase::SubmittedL1)
    }

    async fn l1_receipt(&mut self) -> Result<Receipt> {
        if let Some(receipt) = &self.l1_receipt {
            return Ok(receipt.clone());
        }
        let hash = self
            .tx
            .source_hash
            .ok_or_else(|| BridgeError::InvalidTransition {
                from: self.tx.phase.to_string(),
                to: "confirmed_l1 without source hash".to_string(),
            })?;

        let timing = *self.ctx.timing();
        let receipt = self
            .ctx
            .wait_receipt(&self.tx.id, Chain::L1, hash, &timing.receipt, &self.cancel)
            .await?;
        self.l1_receipt = Some(receipt.clone());
        Ok(receipt)
    }

    async fn confirm_l1(&mut self) -> Result<DepositPhase> {
        self.l1_receipt().await?;
        Ok(DepositPhase::ConfirmedL1)
    }

    async fn derive(&mut self) -> Result<DepositPhase> {
        let receipt = self.l1_receipt().await?;
        let l2_hash = derive_l2_hash(&receipt, Some(self.ctx.portal()))?;
        self.tx.set_derived_hash(l2_hash)?;

        info!(
            target: "opbridge::deposit",
            tx_id = %self.tx.id,
            l2_hash = %l2_hash,
            "derived L2 transaction hash"
        );
        Ok(DepositPhase::DerivedL2Hash)
    }

    async fn confirm_l2(&mut self) -> Result<DepositPhase> {
        let hash = self
            .tx
            .derived_hash
            .ok_or_else(|| BridgeError::InvalidTransition {
                from: self.tx.phase.to_string(),
                to: "confirmed_l2 without derived hash".to_string(),
            })?;

        let timing = *self.ctx.timing();
        self.ctx
            .wait_receipt(&self.tx.id, Chain::L2, hash, &timing.l2_confirm, &self.cancel)
            .await?;
        Ok(DepositPhase::ConfirmedL2)
    }

    /// Record the error on the transaction and hand it back
    async fn handle_error(&mut self, e: BridgeError) -> BridgeError {
        match &e {
            BridgeError::Cancelled(_) => {
                self.tx.mark_cancelled();
                self.ctx.snapshot(&self.tx).await;
                warn!(
                    target: "opbridge::deposit",
                    tx_id = %self.tx.id,
                    phase = %self.tx.phase,
                    "wait cancelled"
                );
            }
            BridgeError::Timeout { .. } => {
                self.ctx.snapshot(&self.tx).await;
                warn!(
                    target: "opbridge::deposit",
                    tx_id = %self.tx.id,
                    phase = %self.tx.phase,
                    error = %e,
                    "wait timed out"
                );
            }
            _ if e.is_fatal() => match self.tx.fail(&e) {
                Ok(from) => {
                    self.ctx.publish(&self.tx, from).await;
                    log_deposit_event("deposit_failed", &self.tx, false, Some(&e.to_string()));
                }
                Err(invalid) => return invalid,
            },
            _ => {
                warn!(
                    target: "opbridge::deposit",
                    tx_id = %self.tx.id,
                    phase = %self.tx.phase,
                    error = %e,
                    "step interrupted, phase kept"
                );
            }
        }
        e
    }
}
