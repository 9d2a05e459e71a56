//! Withdrawal state machine

use alloy_primitives::{Address, Bytes, B256, U256};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::TxRequest;
use crate::context::BridgeContext;
use crate::derivation::{derive_withdrawal_id, WithdrawalSelection};
use crate::error::{BridgeError, Result};
use crate::logging::log_withdrawal_event;
use crate::poll::poll;
use crate::types::{
    wei_to_display, BridgeOutcome, BridgeTransaction, Chain, Direction, GameStatus, Phase,
    WithdrawalPhase,
};

/// L1 gas limit of the withdrawal message when none is given
pub const DEFAULT_WITHDRAWAL_GAS_LIMIT: u64 = 21_000;

/// What to withdraw
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalParams {
    /// Wei sent to the message passer on L2
    pub amount: U256,
    /// L1 target, the submitting account when unset
    pub target: Option<Address>,
    pub gas_limit: U256,
    pub data: Bytes,
    /// Which `MessagePassed` log identifies the withdrawal
    pub selection: WithdrawalSelection,
}

impl WithdrawalParams {
    pub fn new(amount: U256) -> Self {
        Self {
            amount,
            target: None,
            gas_limit: U256::from(DEFAULT_WITHDRAWAL_GAS_LIMIT),
            data: Bytes::new(),
            selection: WithdrawalSelection::default(),
        }
    }

    pub fn to(mut self, target: Address) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_gas_limit(mut self, gas_limit: U256) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_data(mut self, data: Bytes) -> Self {
        self.data = data;
        self
    }

    pub fn with_selection(mut self, selection: WithdrawalSelection) -> Self {
        self.selection = selection;
        self
    }
}

/// Drives one withdrawal through initiate, prove and finalize
pub struct WithdrawalFlow {
    ctx: BridgeContext,
    /// Sender on L2, prover and finalizer on L1
    account: Address,
    params: WithdrawalParams,
    tx: BridgeTransaction,
    cancel: CancellationToken,
}

fn require<T>(value: Option<T>, phase: Phase, what: &str) -> Result<T> {
    value.ok_or_else(|| BridgeError::InvalidTransition {
        from: phase.to_string(),
        to: format!("next phase without {what}"),
    })
}

impl WithdrawalFlow {
    /// Start a new withdrawal from `account`
    pub fn new(ctx: BridgeContext, account: Address, params: WithdrawalParams) -> Self {
        let target = params.target.unwrap_or(account);
        let tx = BridgeTransaction::new_withdrawal(params.amount, target);

        Self {
            ctx,
            account,
            params,
            tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Continue a withdrawal from its recorded phase
    pub fn resume(
        ctx: BridgeContext,
        account: Address,
        params: WithdrawalParams,
        tx: BridgeTransaction,
    ) -> Result<Self> {
        if tx.direction != Direction::WithdrawalL2ToL1 {
            return Err(BridgeError::InvalidTransition {
                from: tx.phase.to_string(),
                to: "withdrawal flow".to_string(),
            });
        }

        Ok(Self {
            ctx,
            account,
            params,
            tx,
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

    pub fn phase(&self) -> WithdrawalPhase {
        self.tx.withdrawal_phase().unwrap_or(WithdrawalPhase::Created)
    }

    /// Run until the withdrawal is finalized on L1 or fails.
    ///
    /// `Timeout` and `Cancelled` leave the phase untouched; calling `run`
    /// again resumes the interrupted wait without resubmitting.
    pub async fn run(&mut self) -> Result<BridgeOutcome> {
        self.ctx.snapshot(&self.tx).await;
        if self.phase() == WithdrawalPhase::Created {
            self.preflight().await;
        }

        while !self.tx.phase.is_terminal() {
            self.step().await?;
        }

        let outcome = self.tx.outcome();
        if outcome.success {
            log_withdrawal_event("withdrawal_completed", &self.tx, true, None);
        }
        Ok(outcome)
    }

    /// Perform exactly one transition
    pub async fn step(&mut self) -> Result<WithdrawalPhase> {
        let result = match self.phase() {
            WithdrawalPhase::Created => self.initiate().await,
            WithdrawalPhase::InitiatedL2 => self.confirm_l2().await,
            WithdrawalPhase::ConfirmedL2 => self.wait_provable().await,
            WithdrawalPhase::Provable => self.prove().await,
            WithdrawalPhase::ProvenL1 => self.wait_finalizable().await,
            WithdrawalPhase::Finalizable => self.finalize().await,
            WithdrawalPhase::FinalizedL1
            | WithdrawalPhase::FailedL2
            | WithdrawalPhase::FailedProve
            | WithdrawalPhase::FailedFinalize => return Ok(self.phase()),
        };

        match result {
            Ok(next) => {
                let from = self.tx.advance(Phase::Withdrawal(next))?;
                self.ctx.publish(&self.tx, from).await;
                Ok(next)
            }
            Err(e) => Err(self.handle_error(e).await),
        }
    }

    /// Balance check, informational only
    async fn preflight(&self) {
        match self.ctx.reader().get_balance(Chain::L2, self.account).await {
            Ok(balance) => {
                info!(
                    target: "opbridge::withdrawal",
                    tx_id = %self.tx.id,
                    account = %self.account,
                    "L2 balance: {}",
                    wei_to_display(balance)
                );
                if balance < self.params.amount {
                    warn!(
                        target: "opbridge::withdrawal",
                        tx_id = %self.tx.id,
                        "L2 balance is below the withdrawal amount {}",
                        wei_to_display(self.params.amount)
                    );
                }
            }
            Err(e) => {
                warn!(
                    target: "opbridge::withdrawal",
                    tx_id = %self.tx.id,
                    error = %e,
                    "L2 balance unavailable"
                );
            }
        }
    }

    fn withdrawal_hash(&self) -> Result<B256> {
        require(self.tx.withdrawal_id(), self.tx.phase, "withdrawal hash")
    }

    async fn initiate(&mut self) -> Result<WithdrawalPhase> {
        let request = TxRequest::InitiateWithdrawal {
            target: self.tx.recipient,
            value: self.params.amount,
            gas_limit: self.params.gas_limit,
            data: self.params.data.clone(),
        };

        let hash = self.ctx.submit(&self.tx.id, request).await?;
        self.tx.set_source_hash(hash)?;
        log_withdrawal_event("withdrawal_initiated", &self.tx, true, None);
        Ok(WithdrawalPhase::InitiatedL2)
    }

    async fn confirm_l2(&mut self) -> Result<WithdrawalPhase> {
        let source = require(self.tx.source_hash, self.tx.phase, "source hash")?;
        let timing = *self.ctx.timing();

        let receipt = self
            .ctx
            .wait_receipt(&self.tx.id, Chain::L2, source, &timing.receipt, &self.cancel)
            .await?;
        let (withdrawal_hash, withdrawal) = derive_withdrawal_id(&receipt, self.params.selection)?;

        self.tx.set_derived_hash(withdrawal_hash)?;
        self.tx.withdrawal = Some(withdrawal);
        self.tx.l2_block_number = Some(receipt.block_number);

        info!(
            target: "opbridge::withdrawal",
            tx_id = %self.tx.id,
            withdrawal_hash = %withdrawal_hash,
            l2_block = receipt.block_number,
            "withdrawal confirmed on L2"
        );
        Ok(WithdrawalPhase::ConfirmedL2)
    }

    async fn wait_provable(&mut self) -> Result<WithdrawalPhase> {
        let l2_block = require(self.tx.l2_block_number, self.tx.phase, "L2 block number")?;
        let timing = *self.ctx.timing();
        let reader = self.ctx.reader();

        let game = poll("dispute game", &timing.prove, &self.cancel, || async move {
            reader.find_game(l2_block).await
        })
        .await?;

        info!(
            target: "opbridge::withdrawal",
            tx_id = %self.tx.id,
            game = %game.proxy,
            game_index = %game.index,
            game_l2_block = game.l2_block_number,
            "withdrawal is provable"
        );
        self.tx.output_ref = Some(game);
        Ok(WithdrawalPhase::Provable)
    }

    async fn prove(&mut self) -> Result<WithdrawalPhase> {
        let withdrawal_hash = self.withdrawal_hash()?;
        let timing = *self.ctx.timing();
        let account = self.account;

        let prove_hash = match self.tx.prove_hash {
            Some(hash) => hash,
            None => {
                let reader = self.ctx.reader();
                let existing = poll("proof lookup", &timing.receipt, &self.cancel, || async move {
                    reader.proven_withdrawal(withdrawal_hash, account).await.map(Some)
                })
                .await?;

                if let Some(proven) = existing {
                    info!(
                        target: "opbridge::withdrawal",
                        tx_id = %self.tx.id,
                        game = %proven.game_proxy,
                        proven_at = proven.timestamp,
                        "withdrawal already proven, skipping submission"
                    );
                    return Ok(WithdrawalPhase::ProvenL1);
                }

                let withdrawal = require(self.tx.withdrawal.clone(), self.tx.phase, "withdrawal")?;
                let game = require(self.tx.output_ref.clone(), self.tx.phase, "dispute game")?;
                let game_ref = &game;
                let (output_root_proof, withdrawal_proof) =
                    poll("prove arguments", &timing.receipt, &self.cancel, || async move {
                        reader.build_prove_args(withdrawal_hash, game_ref).await.map(Some)
                    })
                    .await?;

                let request = TxRequest::ProveWithdrawal {
                    withdrawal,
                    game: game.clone(),
                    output_root_proof,
                    withdrawal_proof,
                };
                let hash = self.ctx.submit(&self.tx.id, request).await?;
                self.tx.prove_hash = Some(hash);
                self.ctx.snapshot(&self.tx).await;
                log_withdrawal_event("withdrawal_prove_submitted", &self.tx, true, None);
                hash
            }
        };

        self.ctx
            .wait_receipt(&self.tx.id, Chain::L1, prove_hash, &timing.receipt, &self.cancel)
            .await?;
        Ok(WithdrawalPhase::ProvenL1)
    }

    async fn wait_finalizable(&mut self) -> Result<WithdrawalPhase> {
        let withdrawal_hash = self.withdrawal_hash()?;
        let timing = *self.ctx.timing();
        let account = self.account;
        let reader = self.ctx.reader();

        poll("challenge window", &timing.finalize, &self.cancel, || async move {
            match reader.proven_withdrawal(withdrawal_hash, account).await? {
                None => Ok::<_, BridgeError>(None),
                Some(proven) => Ok(reader.is_finalizable(&proven).await?.then_some(())),
            }
        })
        .await?;

        info!(target: "opbridge::withdrawal", tx_id = %self.tx.id, "challenge window elapsed");
        Ok(WithdrawalPhase::Finalizable)
    }

    async fn finalize(&mut self) -> Result<WithdrawalPhase> {
        let timing = *self.ctx.timing();

        let finalize_hash = match self.tx.finalize_hash {
            Some(hash) => hash,
            None => {
                let withdrawal = require(self.tx.withdrawal.clone(), self.tx.phase, "withdrawal")?;
                match self
                    .ctx
                    .submit(&self.tx.id, TxRequest::FinalizeWithdrawal { withdrawal })
                    .await
                {
                    Ok(hash) => {
                        self.tx.finalize_hash = Some(hash);
                        self.ctx.snapshot(&self.tx).await;
                        log_withdrawal_event("withdrawal_finalize_submitted", &self.tx, true, None);
                        hash
                    }
                    Err(e) if e.is_fatal() => return self.resolve_finalize_failure(e).await,
                    Err(e) => return Err(e),
                }
            }
        };

        match self
            .ctx
            .wait_receipt(&self.tx.id, Chain::L1, finalize_hash, &timing.receipt, &self.cancel)
            .await
        {
            Ok(_) => Ok(WithdrawalPhase::FinalizedL1),
            Err(e @ BridgeError::Reverted { .. }) => self.resolve_finalize_failure(e).await,
            Err(e) => Err(e),
        }
    }

    /// A refused or reverted finalize is success when the portal already
    /// marks the withdrawal finalized, and permanent when the proving game
    /// was lost.
    async fn resolve_finalize_failure(&self, error: BridgeError) -> Result<WithdrawalPhase> {
        let withdrawal_hash = self.withdrawal_hash()?;
        let timing = *self.ctx.timing();
        let reader = self.ctx.reader();
        let account = self.account;
        let fallback_game = self.tx.output_ref.as_ref().map(|g| g.proxy);

        // (already finalized, proving game lost to a challenger)
        let (finalized, lost_game) =
            poll("finalize resolution", &timing.receipt, &self.cancel, || async move {
                if reader.is_finalized(withdrawal_hash).await? {
                    return Ok::<_, BridgeError>(Some((true, None)));
                }

                let game = match reader.proven_withdrawal(withdrawal_hash, account).await? {
                    Some(proven) => Some(proven.game_proxy),
                    None => fallback_game,
                };
                let lost = match game {
                    Some(game) => (reader.game_status(game).await? == GameStatus::ChallengerWins)
                        .then_some(game),
                    None => None,
                };
                Ok(Some((false, lost)))
            })
            .await?;

        if finalized {
            info!(
                target: "opbridge::withdrawal",
                tx_id = %self.tx.id,
                error = %error,
                "withdrawal already finalized, treating as success"
            );
            return Ok(WithdrawalPhase::FinalizedL1);
        }

        if let Some(game) = lost_game {
            return Err(BridgeError::ChallengeDetected {
                withdrawal_hash,
                game,
            });
        }

        Err(error)
    }

    /// Record the error on the transaction and hand it back
    async fn handle_error(&mut self, e: BridgeError) -> BridgeError {
        match &e {
            BridgeError::Cancelled(_) => {
                self.tx.mark_cancelled();
                self.ctx.snapshot(&self.tx).await;
                warn!(
                    target: "opbridge::withdrawal",
                    tx_id = %self.tx.id,
                    phase = %self.tx.phase,
                    "wait cancelled"
                );
            }
            BridgeError::Timeout { .. } => {
                self.ctx.snapshot(&self.tx).await;
                warn!(
                    target: "opbridge::withdrawal",
                    tx_id = %self.tx.id,
                    phase = %self.tx.phase,
                    error = %e,
                    "wait timed out"
                );
            }
            _ if e.is_fatal() => match self.tx.fail(&e) {
                Ok(from) => {
                    self.ctx.publish(&self.tx, from).await;
                    log_withdrawal_event(
                        "withdrawal_failed",
                        &self.tx,
                        false,
                        Some(&e.to_string()),
                    );
                }
                Err(invalid) => return invalid,
            },
            _ => {
                warn!(
                    target: "opbridge::withdrawal",
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
