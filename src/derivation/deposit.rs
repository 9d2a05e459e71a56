//! Deposit Hash Derivation
//!
//! The L2 side of a deposit is never submitted by us: the rollup node
//! synthesizes a type `0x7E` transaction from each `TransactionDeposited`
//! log. Re-deriving that transaction from the L1 receipt gives the hash to
//! wait for on L2.

use alloy_primitives::{b256, keccak256, Address, Bytes, B256, U256};
use alloy_rlp::{Encodable, Header, EMPTY_STRING_CODE};
use thiserror::Error;

use crate::error::{BridgeError, Result};
use crate::types::{Log, Receipt};

/// Deposit event abi hash.
///
/// `keccak256("TransactionDeposited(address,address,uint256,bytes)")`
pub const DEPOSIT_EVENT_ABI_HASH: B256 =
    b256!("b3813568d9991fc951961fcb4c784893574240a28925604d09fc577c55bb7c32");

/// EIP-2718 type byte of deposit transactions
pub const DEPOSIT_TX_TYPE: u8 = 0x7E;

/// Source hash domain of user deposits
const USER_DEPOSIT_DOMAIN: u64 = 0;

/// Reasons a `TransactionDeposited` log cannot be decoded
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DepositLogError {
    #[error("unexpected number of deposit event log topics: {0}")]
    UnexpectedTopicsLen(usize),

    #[error("log data too short for opaqueData header: {0} bytes")]
    IncompleteOpaqueData(usize),

    #[error("log data is not 32-byte aligned: {0} bytes")]
    UnalignedData(usize),

    #[error("failed to decode address from topic {0}")]
    AddressDecode(B256),

    #[error("invalid opaqueData offset")]
    InvalidOffset,

    #[error("opaqueData length {expected} exceeds log data ({actual} bytes available)")]
    InvalidLength { expected: usize, actual: usize },

    #[error("unsupported deposit version: {0}")]
    UnsupportedVersion(B256),

    #[error("opaqueData too short for a version 0 deposit: {0} bytes")]
    ShortOpaqueData(usize),

    #[error("opaqueData padding is not all zeros: {0}")]
    InvalidOpaqueDataPadding(Bytes),
}

/// A deposited transaction rebuilt from its L1 log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositedTransaction {
    pub source_hash: B256,
    pub from: Address,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub mint: U256,
    pub value: U256,
    pub gas_limit: u64,
    pub is_system_tx: bool,
    pub data: Bytes,
}

impl DepositedTransaction {
    /// Decode a `TransactionDeposited` log emitted in block `l1_block_hash`.
    pub fn from_log(log: &Log, l1_block_hash: B256) -> std::result::Result<Self, DepositLogError> {
        let topics = &log.topics;
        if topics.len() != 4 {
            return Err(DepositLogError::UnexpectedTopicsLen(topics.len()));
        }

        let from = topic_address(topics[1])?;
        let to = topic_address(topics[2])?;
        let version = topics[3];
        if !version.is_zero() {
            return Err(DepositLogError::UnsupportedVersion(version));
        }

        // abi.encode(bytes opaqueData): offset word, length word, padded content
        let data = &log.data;
        if data.len() < 64 {
            return Err(DepositLogError::IncompleteOpaqueData(data.len()));
        }
        if data.len() % 32 != 0 {
            return Err(DepositLogError::UnalignedData(data.len()));
        }
        if U256::from_be_slice(&data[0..32]) != U256::from(32) {
            return Err(DepositLogError::InvalidOffset);
        }
        let len = usize::try_from(U256::from_be_slice(&data[32..64])).map_err(|_| {
            DepositLogError::InvalidLength {
                expected: usize::MAX,
                actual: data.len() - 64,
            }
        })?;
        let opaque = data
            .get(64..64usize.saturating_add(len))
            .ok_or(DepositLogError::InvalidLength {
                expected: len,
                actual: data.len() - 64,
            })?;

        // the EVM pads opaqueData with zeros up to the next word
        let content_end = 64 + opaque.len();
        let padding_end = content_end.div_ceil(32) * 32;
        let padding = &data[content_end..padding_end.min(data.len())];
        if padding.iter().any(|b| *b != 0) {
            return Err(DepositLogError::InvalidOpaqueDataPadding(Bytes::copy_from_slice(
                &data[content_end..],
            )));
        }

        // mint u256 | value u256 | gasLimit u64 | isCreation u8 | data
        if opaque.len() < 32 + 32 + 8 + 1 {
            return Err(DepositLogError::ShortOpaqueData(opaque.len()));
        }
        let mint = U256::from_be_slice(&opaque[0..32]);
        let value = U256::from_be_slice(&opaque[32..64]);
        let mut gas = [0u8; 8];
        gas.copy_from_slice(&opaque[64..72]);
        let is_creation = opaque[72] != 0;

        Ok(Self {
            source_hash: user_deposit_source_hash(l1_block_hash, log.log_index),
            from,
            to: if is_creation { None } else { Some(to) },
            mint,
            value,
            gas_limit: u64::from_be_bytes(gas),
            is_system_tx: false,
            data: Bytes::copy_from_slice(&opaque[73..]),
        })
    }

    fn fields_len(&self) -> usize {
        self.source_hash.length()
            + self.from.length()
            + self.to.map_or(1, |to| to.length())
            + self.mint.length()
            + self.value.length()
            + self.gas_limit.length()
            + self.is_system_tx.length()
            + self.data.length()
    }

    /// Writes `0x7E || rlp([source_hash, from, to, mint, value, gas, is_system_tx, data])`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(DEPOSIT_TX_TYPE);
        Header {
            list: true,
            payload_length: self.fields_len(),
        }
        .encode(out);
        self.source_hash.encode(out);
        self.from.encode(out);
        match self.to {
            Some(to) => to.encode(out),
            None => out.push(EMPTY_STRING_CODE),
        }
        self.mint.encode(out);
        self.value.encode(out);
        self.gas_limit.encode(out);
        self.is_system_tx.encode(out);
        self.data.encode(out);
    }

    /// L2 transaction hash
    pub fn tx_hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(128 + self.data.len());
        self.encode(&mut buf);
        keccak256(&buf)
    }
}

/// `keccak256(bytes32(0) || keccak256(l1_block_hash || bytes32(log_index)))`
pub fn user_deposit_source_hash(l1_block_hash: B256, log_index: u64) -> B256 {
    let mut input = [0u8; 64];
    input[..32].copy_from_slice(l1_block_hash.as_slice());
    input[56..].copy_from_slice(&log_index.to_be_bytes());
    let deposit_id = keccak256(input);

    let mut domain_input = [0u8; 64];
    domain_input[24..32].copy_from_slice(&USER_DEPOSIT_DOMAIN.to_be_bytes());
    domain_input[32..].copy_from_slice(deposit_id.as_slice());
    keccak256(domain_input)
}

fn topic_address(topic: B256) -> std::result::Result<Address, DepositLogError> {
    if topic[..12].iter().any(|b| *b != 0) {
        return Err(DepositLogError::AddressDecode(topic));
    }
    Ok(Address::from_slice(&topic[12..]))
}

/// Every deposit in an L1 receipt, in log order.
///
/// When `portal` is given, only logs emitted by it are considered.
pub fn deposits_in_receipt(
    receipt: &Receipt,
    portal: Option<Address>,
) -> Result<Vec<DepositedTransaction>> {
    let logs: Vec<&Log> = receipt
        .logs
        .iter()
        .filter(|log| log.topics.first() == Some(&DEPOSIT_EVENT_ABI_HASH))
        .filter(|log| portal.map_or(true, |p| log.address == p))
        .collect();

    if logs.is_empty() {
        return Err(BridgeError::malformed(
            receipt.transaction_hash,
            "no TransactionDeposited log",
        ));
    }

    logs.into_iter()
        .map(|log| {
            DepositedTransaction::from_log(log, receipt.block_hash).map_err(|e| {
                BridgeError::malformed(
                    receipt.transaction_hash,
                    format!("deposit log {}: {}", log.log_index, e),
                )
            })
        })
        .collect()
}

/// L2 hashes of every deposit in an L1 receipt, in log order
pub fn derive_l2_hashes(receipt: &Receipt, portal: Option<Address>) -> Result<Vec<B256>> {
    Ok(deposits_in_receipt(receipt, portal)?
        .iter()
        .map(DepositedTransaction::tx_hash)
        .collect())
}

/// L2 hash of the (first) deposit in an L1 receipt
pub fn derive_l2_hash(receipt: &Receipt, portal: Option<Address>) -> Result<B256> {
    let hashes = derive_l2_hashes(receipt, portal)?;
    hashes
        .first()
        .copied()
        .ok_or_else(|| BridgeError::malformed(receipt.transaction_hash, "no deposit"))
}
