//! OP Stack contract bindings.
//!
//! Events decoded from receipts and the four calls the bridge sends:
//! - OptimismPortal2 (L1): `depositTransaction`, `proveWithdrawalTransaction`,
//!   `finalizeWithdrawalTransaction`
//! - L2ToL1MessagePasser (L2 predeploy): `initiateWithdrawal`

use alloy_primitives::{address, Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};

use crate::client::{OutputRootProof as ProofFields, TxRequest};
use crate::types::WithdrawalTransaction as Withdrawal;

/// L2ToL1MessagePasser predeploy, identical on every OP Stack chain
pub const MESSAGE_PASSER_ADDRESS: Address = address!("4200000000000000000000000000000000000016");

sol! {
    /// L2ToL1MessagePasser - L2 predeploy contract for initiating withdrawals
    interface IL2ToL1MessagePasser {
        /// Emitted when a withdrawal is initiated on L2
        event MessagePassed(
            uint256 indexed nonce,
            address indexed sender,
            address indexed target,
            uint256 value,
            uint256 gasLimit,
            bytes data,
            bytes32 withdrawalHash
        );

        /// Initiate a withdrawal from L2 to L1
        function initiateWithdrawal(
            address _target,
            uint256 _gasLimit,
            bytes calldata _data
        ) external payable;
    }

    /// OptimismPortal2 - L1 entry point for deposits, proofs and finalization
    interface IOptimismPortal2 {
        /// Emitted for every deposit, carries the packed L2 transaction
        event TransactionDeposited(
            address indexed from,
            address indexed to,
            uint256 indexed version,
            bytes opaqueData
        );

        function depositTransaction(
            address _to,
            uint256 _value,
            uint64 _gasLimit,
            bool _isCreation,
            bytes calldata _data
        ) external payable;

        function proveWithdrawalTransaction(
            WithdrawalTransaction calldata _tx,
            uint256 _disputeGameIndex,
            OutputRootProof calldata _outputRootProof,
            bytes[] calldata _withdrawalProof
        ) external;

        function finalizeWithdrawalTransaction(WithdrawalTransaction calldata _tx) external;
    }

    /// Output root proof structure (used in proving withdrawals)
    #[derive(Debug)]
    struct OutputRootProof {
        bytes32 version;
        bytes32 stateRoot;
        bytes32 messagePasserStorageRoot;
        bytes32 latestBlockhash;
    }

    /// Withdrawal transaction structure (shared across contracts)
    #[derive(Debug)]
    struct WithdrawalTransaction {
        uint256 nonce;
        address sender;
        address target;
        uint256 value;
        uint256 gasLimit;
        bytes data;
    }
}

impl From<&Withdrawal> for WithdrawalTransaction {
    fn from(w: &Withdrawal) -> Self {
        Self {
            nonce: w.nonce,
            sender: w.sender,
            target: w.target,
            value: w.value,
            gasLimit: w.gas_limit,
            data: w.data.clone(),
        }
    }
}

impl From<&ProofFields> for OutputRootProof {
    fn from(p: &ProofFields) -> Self {
        Self {
            version: p.version,
            stateRoot: p.state_root,
            messagePasserStorageRoot: p.message_passer_storage_root,
            latestBlockhash: p.latest_blockhash,
        }
    }
}

/// A ready-to-sign call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCall {
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
}

/// ABI-encode a bridge request against the given L1 portal
pub fn encode_request(request: &TxRequest, portal: Address) -> EncodedCall {
    match request {
        TxRequest::Deposit {
            to,
            mint,
            value,
            gas_limit,
            is_creation,
            data,
        } => {
            let call = IOptimismPortal2::depositTransactionCall {
                _to: *to,
                _value: *value,
                _gasLimit: *gas_limit,
                _isCreation: *is_creation,
                _data: data.clone(),
            };
            EncodedCall {
                to: portal,
                value: *mint,
                input: call.abi_encode().into(),
            }
        }
        TxRequest::InitiateWithdrawal {
            target,
            value,
            gas_limit,
            data,
        } => {
            let call = IL2ToL1MessagePasser::initiateWithdrawalCall {
                _target: *target,
                _gasLimit: *gas_limit,
                _data: data.clone(),
            };
            EncodedCall {
                to: MESSAGE_PASSER_ADDRESS,
                value: *value,
                input: call.abi_encode().into(),
            }
        }
        TxRequest::ProveWithdrawal {
            withdrawal,
            game,
            output_root_proof,
            withdrawal_proof,
        } => {
            let call = IOptimismPortal2::proveWithdrawalTransactionCall {
                _tx: withdrawal.into(),
                _disputeGameIndex: game.index,
                _outputRootProof: output_root_proof.into(),
                _withdrawalProof: withdrawal_proof.clone(),
            };
            EncodedCall {
                to: portal,
                value: U256::ZERO,
                input: call.abi_encode().into(),
            }
        }
        TxRequest::FinalizeWithdrawal { withdrawal } => {
            let call = IOptimismPortal2::finalizeWithdrawalTransactionCall {
                _tx: withdrawal.into(),
            };
            EncodedCall {
                to: portal,
                value: U256::ZERO,
                input: call.abi_encode().into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolEvent;

    #[test]
    fn test_event_selectors() {
        assert_eq!(
            IOptimismPortal2::TransactionDeposited::SIGNATURE_HASH,
            crate::derivation::DEPOSIT_EVENT_ABI_HASH
        );
        assert_eq!(
            IL2ToL1MessagePasser::MessagePassed::SIGNATURE,
            "MessagePassed(uint256,address,address,uint256,uint256,bytes,bytes32)"
        );
    }

    #[test]
    fn test_deposit_call_routing() {
        let portal = address!("956962C34687A954e611A83619ABaA37Ce6bC78A");
        let call = encode_request(
            &TxRequest::Deposit {
                to: Address::repeat_byte(0x11),
                mint: U256::from(1_000u64),
                value: U256::from(1_000u64),
                gas_limit: 100_000,
                is_creation: false,
                data: Bytes::new(),
            },
            portal,
        );

        assert_eq!(call.to, portal);
        assert_eq!(call.value, U256::from(1_000u64));
        assert_eq!(&call.input[..4], &IOptimismPortal2::depositTransactionCall::SELECTOR);
    }

    #[test]
    fn test_withdrawal_call_routing() {
        let call = encode_request(
            &TxRequest::InitiateWithdrawal {
                target: Address::repeat_byte(0x22),
                value: U256::from(50u64),
                gas_limit: U256::from(21_000u64),
                data: Bytes::new(),
            },
            Address::ZERO,
        );

        assert_eq!(call.to, MESSAGE_PASSER_ADDRESS);
        assert_eq!(call.value, U256::from(50u64));
        assert_eq!(
            &call.input[..4],
            &IL2ToL1MessagePasser::initiateWithdrawalCall::SELECTOR
        );
    }
}
