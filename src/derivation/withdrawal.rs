//! Withdrawal Identity
//!
//! A withdrawal is identified on L1 by the hash of the message-passer
//! withdrawal tuple. The tuple is read back from the `MessagePassed` log of
//! the L2 initiation receipt, and the hash is recomputed to check that the
//! log is consistent.

use alloy_primitives::{keccak256, B256, U256};
use alloy_sol_types::{SolEvent, SolValue};
use serde::{Deserialize, Serialize};

use crate::client::OutputRootProof;
use crate::contracts::{IL2ToL1MessagePasser::MessagePassed, MESSAGE_PASSER_ADDRESS};
use crate::error::{BridgeError, Result};
use crate::types::{Receipt, WithdrawalTransaction};

/// How to pick a withdrawal when a receipt contains several
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalSelection {
    /// Lowest log index
    #[default]
    First,
    /// N-th withdrawal in log order
    Index(usize),
    /// Exactly one withdrawal is allowed
    Strict,
}

/// Withdrawal decoded from an L2 receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedWithdrawal {
    pub withdrawal_hash: B256,
    pub withdrawal: WithdrawalTransaction,
    pub log_index: u64,
}

/// `keccak256(abi.encode(nonce, sender, target, value, gasLimit, data))`
pub fn hash_withdrawal(w: &WithdrawalTransaction) -> B256 {
    let encoded = (
        w.nonce,
        w.sender,
        w.target,
        w.value,
        w.gas_limit,
        w.data.clone(),
    )
        .abi_encode_params();
    keccak256(encoded)
}

/// Slot of `sentMessages[withdrawal_hash]` in the message passer
pub fn withdrawal_storage_slot(withdrawal_hash: B256) -> B256 {
    keccak256((withdrawal_hash, U256::ZERO).abi_encode())
}

/// Output root committed by a dispute game
pub fn output_root(proof: &OutputRootProof) -> B256 {
    let mut buf = [0u8; 128];
    buf[..32].copy_from_slice(proof.version.as_slice());
    buf[32..64].copy_from_slice(proof.state_root.as_slice());
    buf[64..96].copy_from_slice(proof.message_passer_storage_root.as_slice());
    buf[96..].copy_from_slice(proof.latest_blockhash.as_slice());
    keccak256(buf)
}

/// All withdrawals initiated in an L2 receipt, in log order
pub fn withdrawals_in_receipt(receipt: &Receipt) -> Result<Vec<DerivedWithdrawal>> {
    let mut found = Vec::new();

    for log in receipt.logs.iter().filter(|log| {
        log.address == MESSAGE_PASSER_ADDRESS
            && log.topics.first() == Some(&MessagePassed::SIGNATURE_HASH)
    }) {
        let event = MessagePassed::decode_raw_log(log.topics.iter().copied(), &log.data, true)
            .map_err(|e| {
                BridgeError::malformed(
                    receipt.transaction_hash,
                    format!("MessagePassed log {}: {}", log.log_index, e),
                )
            })?;

        let withdrawal = WithdrawalTransaction {
            nonce: event.nonce,
            sender: event.sender,
            target: event.target,
            value: event.value,
            gas_limit: event.gasLimit,
            data: event.data,
        };
        let withdrawal_hash = hash_withdrawal(&withdrawal);
        if withdrawal_hash != event.withdrawalHash {
            return Err(BridgeError::malformed(
                receipt.transaction_hash,
                format!(
                    "withdrawal hash mismatch at log {}: event {}, computed {}",
                    log.log_index, event.withdrawalHash, withdrawal_hash
                ),
            ));
        }

        found.push(DerivedWithdrawal {
            withdrawal_hash,
            withdrawal,
            log_index: log.log_index,
        });
    }

    found.sort_by_key(|w| w.log_index);
    Ok(found)
}

/// Withdrawal hash and tuple for the selected withdrawal in a receipt
pub fn derive_withdrawal_id(
    receipt: &Receipt,
    selection: WithdrawalSelection,
) -> Result<(B256, WithdrawalTransaction)> {
    let mut all = withdrawals_in_receipt(receipt)?;
    let hash = receipt.transaction_hash;

    if all.is_empty() {
        return Err(BridgeError::malformed(hash, "no MessagePassed log"));
    }

    let picked = match selection {
        WithdrawalSelection::First => all.swap_remove(0),
        WithdrawalSelection::Strict if all.len() > 1 => {
            return Err(BridgeError::MultipleWithdrawals {
                hash,
                count: all.len(),
            })
        }
        WithdrawalSelection::Strict => all.swap_remove(0),
        WithdrawalSelection::Index(i) if i < all.len() => all.swap_remove(i),
        WithdrawalSelection::Index(i) => {
            return Err(BridgeError::malformed(
                hash,
                format!("withdrawal index {} out of range ({} found)", i, all.len()),
            ))
        }
    };

    Ok((picked.withdrawal_hash, picked.withdrawal))
}
