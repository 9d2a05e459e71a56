//! Scripted in-memory L1/L2 pair implementing the collaborator traits.
//!
//! Submissions produce receipts with real bridge logs, so the flows run
//! their actual derivation against them. Tests steer timing (receipt delays,
//! game publication, L1 clock) through the `FakeChain` setters.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{address, keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::abi::token::WordToken;
use alloy_sol_types::SolEvent;
use async_trait::async_trait;

use opbridge::client::{
    BlockHeader, ClientError, ContractReader, OutputRootProof, RawGame, ReceiptSource,
    StorageProof, TxRequest, TxSubmitter,
};
use opbridge::contracts::{
    IL2ToL1MessagePasser::MessagePassed, IOptimismPortal2::TransactionDeposited,
    MESSAGE_PASSER_ADDRESS,
};
use opbridge::derivation::{derive_l2_hash, hash_withdrawal, output_root};
use opbridge::poll::PollConfig;
use opbridge::{BridgeContext, Chain, FlowTiming, Log, Receipt, WithdrawalTransaction};

pub const ACCOUNT: Address = address!("0101010101010101010101010101010101010101");
pub const PORTAL: Address = address!("956962C34687A954e611A83619ABaA37Ce6bC78A");

/// L1 time at start
pub const GENESIS_TIME: u64 = 1_700_000_000;
pub const PROOF_MATURITY_DELAY: u64 = 7 * 24 * 3600;
pub const GAME_FINALITY_DELAY: u64 = 84 * 3600;

/// L2 block of every withdrawal initiation
pub const WITHDRAWAL_L2_BLOCK: u64 = 1_000;

/// How the portal answers a finalize submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeMode {
    Succeed,
    /// Someone else finalized first; the call reverts at estimation
    AlreadyFinalized,
    /// Mined but reverted; another finalize landed in the same block
    MinedRevert,
    /// Mined but reverted, and the withdrawal stays unfinalized
    MinedRevertUnfinalized,
}

struct PendingGame {
    /// Visible once `game_count` was called more than this many times
    visible_after: usize,
    game: RawGame,
}

struct State {
    counter: u64,
    submissions: Vec<TxRequest>,
    receipts: HashMap<(Chain, B256), Receipt>,
    /// `None` answers left before a receipt shows up
    receipt_delays: HashMap<(Chain, B256), usize>,
    l2_deposit_delay: usize,
    l2_deposit_reverts: bool,
    games: Vec<PendingGame>,
    game_count_calls: usize,
    game_status: HashMap<Address, u8>,
    resolved_at: HashMap<Address, u64>,
    now_l1: u64,
    /// Added to the L1 clock on every head timestamp read
    clock_step: u64,
    proven: HashMap<B256, (Address, u64)>,
    finalized: HashSet<B256>,
    finalize_mode: FinalizeMode,
}

pub struct FakeChain {
    state: Mutex<State>,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                counter: 0,
                submissions: Vec::new(),
                receipts: HashMap::new(),
                receipt_delays: HashMap::new(),
                l2_deposit_delay: 0,
                l2_deposit_reverts: false,
                games: Vec::new(),
                game_count_calls: 0,
                game_status: HashMap::new(),
                resolved_at: HashMap::new(),
                now_l1: GENESIS_TIME,
                clock_step: 0,
                proven: HashMap::new(),
                finalized: HashSet::new(),
                finalize_mode: FinalizeMode::Succeed,
            }),
        })
    }

    pub fn context(self: &Arc<Self>) -> BridgeContext {
        BridgeContext::new(self.clone(), self.clone(), self.clone(), PORTAL)
            .with_timing(test_timing())
    }

    // --- scripting ---

    pub fn set_l2_deposit_delay(&self, lookups: usize) {
        self.state.lock().unwrap().l2_deposit_delay = lookups;
    }

    pub fn set_l2_deposit_reverts(&self, reverts: bool) {
        self.state.lock().unwrap().l2_deposit_reverts = reverts;
    }

    /// Make every pending receipt available on the next lookup
    pub fn release_receipts(&self) {
        self.state.lock().unwrap().receipt_delays.clear();
    }

    /// Publish a defender-won game covering `l2_block`, visible after
    /// `visible_after` factory reads
    pub fn publish_game(&self, l2_block: u64, visible_after: usize) -> Address {
        let mut state = self.state.lock().unwrap();
        let index = state.games.len() as u64;
        let proxy = Address::with_last_byte(0x40 + index as u8);

        let mut meta = [0u8; 32];
        meta[4..12].copy_from_slice(&state.now_l1.to_be_bytes());
        meta[12..].copy_from_slice(proxy.as_slice());

        let game = RawGame {
            index: U256::from(index),
            metadata: B256::from(meta),
            timestamp: U256::from(state.now_l1),
            root_claim: root_claim_for(l2_block),
            extra_data: Bytes::copy_from_slice(&U256::from(l2_block).to_be_bytes::<32>()),
        };
        let visible_after = state.game_count_calls + visible_after;
        state.games.push(PendingGame { visible_after, game });
        state.game_status.insert(proxy, 2);
        let now = state.now_l1;
        state.resolved_at.insert(proxy, now);
        proxy
    }

    pub fn set_game_status(&self, proxy: Address, status: u8) {
        self.state.lock().unwrap().game_status.insert(proxy, status);
    }

    pub fn set_clock_step(&self, step: u64) {
        self.state.lock().unwrap().clock_step = step;
    }

    pub fn advance_time(&self, secs: u64) {
        self.state.lock().unwrap().now_l1 += secs;
    }

    pub fn set_finalize_mode(&self, mode: FinalizeMode) {
        self.state.lock().unwrap().finalize_mode = mode;
    }

    /// Record a proof as if submitted earlier by `ACCOUNT`
    pub fn record_proof(&self, withdrawal_hash: B256, game: Address) {
        let mut state = self.state.lock().unwrap();
        let now = state.now_l1;
        state.proven.insert(withdrawal_hash, (game, now));
    }

    // --- inspection ---

    pub fn submissions(&self) -> Vec<TxRequest> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn submitted(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .submissions
            .iter()
            .filter(|r| r.name() == name)
            .count()
    }

    pub fn receipt(&self, chain: Chain, hash: B256) -> Option<Receipt> {
        self.state.lock().unwrap().receipts.get(&(chain, hash)).cloned()
    }

    pub fn is_finalized(&self, withdrawal_hash: B256) -> bool {
        self.state.lock().unwrap().finalized.contains(&withdrawal_hash)
    }
}

impl State {
    fn next_hash(&mut self, tag: &str) -> B256 {
        self.counter += 1;
        keccak256(format!("{tag}-{}", self.counter))
    }

    fn deposit(
        &mut self,
        to: Address,
        mint: U256,
        value: U256,
        gas_limit: u64,
        data: &Bytes,
    ) -> B256 {
        let hash = self.next_hash("l1-deposit");

        let mut opaque = Vec::new();
        opaque.extend_from_slice(&mint.to_be_bytes::<32>());
        opaque.extend_from_slice(&value.to_be_bytes::<32>());
        opaque.extend_from_slice(&gas_limit.to_be_bytes());
        opaque.push(0);
        opaque.extend_from_slice(data);

        let event = TransactionDeposited {
            from: ACCOUNT,
            to,
            version: U256::ZERO,
            opaqueData: opaque.into(),
        };
        let receipt = Receipt {
            transaction_hash: hash,
            block_hash: keccak256(hash),
            block_number: 7_000_000,
            status: true,
            logs: vec![to_log(PORTAL, event.encode_topics(), event.encode_data(), 5)],
        };

        // the rollup node derives the same transaction
        if let Ok(l2_hash) = derive_l2_hash(&receipt, Some(PORTAL)) {
            self.receipts.insert(
                (Chain::L2, l2_hash),
                Receipt {
                    transaction_hash: l2_hash,
                    block_hash: keccak256(l2_hash),
                    block_number: 2_000,
                    status: !self.l2_deposit_reverts,
                    logs: vec![],
                },
            );
            self.receipt_delays
                .insert((Chain::L2, l2_hash), self.l2_deposit_delay);
        }
        self.receipts.insert((Chain::L1, hash), receipt);
        hash
    }

    fn initiate(&mut self, target: Address, value: U256, gas_limit: U256, data: &Bytes) -> B256 {
        let hash = self.next_hash("l2-initiate");
        let withdrawal = WithdrawalTransaction {
            nonce: U256::from(self.counter),
            sender: ACCOUNT,
            target,
            value,
            gas_limit,
            data: data.clone(),
        };
        let event = MessagePassed {
            nonce: withdrawal.nonce,
            sender: withdrawal.sender,
            target: withdrawal.target,
            value: withdrawal.value,
            gasLimit: withdrawal.gas_limit,
            data: withdrawal.data.clone(),
            withdrawalHash: hash_withdrawal(&withdrawal),
        };

        self.receipts.insert(
            (Chain::L2, hash),
            Receipt {
                transaction_hash: hash,
                block_hash: keccak256(hash),
                block_number: WITHDRAWAL_L2_BLOCK,
                status: true,
                logs: vec![to_log(
                    MESSAGE_PASSER_ADDRESS,
                    event.encode_topics(),
                    event.encode_data(),
                    1,
                )],
            },
        );
        hash
    }

    fn l1_success(&mut self, tag: &str) -> B256 {
        self.l1_receipt(tag, true)
    }

    fn l1_revert(&mut self, tag: &str) -> B256 {
        self.l1_receipt(tag, false)
    }

    fn l1_receipt(&mut self, tag: &str, status: bool) -> B256 {
        let hash = self.next_hash(tag);
        self.receipts.insert(
            (Chain::L1, hash),
            Receipt {
                transaction_hash: hash,
                block_hash: keccak256(hash),
                block_number: 7_000_100,
                status,
                logs: vec![],
            },
        );
        hash
    }
}

fn to_log(address: Address, topics: Vec<WordToken>, data: Vec<u8>, log_index: u64) -> Log {
    Log {
        address,
        topics: topics.into_iter().map(|t| t.0).collect(),
        data: data.into(),
        log_index,
    }
}

fn l2_header(number: u64) -> BlockHeader {
    BlockHeader {
        number,
        hash: keccak256(format!("l2-block-{number}")),
        state_root: keccak256(format!("l2-state-{number}")),
        timestamp: GENESIS_TIME + number * 2,
    }
}

const MESSAGE_PASSER_STORAGE_ROOT: B256 = B256::repeat_byte(0x5A);

fn root_claim_for(l2_block: u64) -> B256 {
    let header = l2_header(l2_block);
    output_root(&OutputRootProof {
        version: B256::ZERO,
        state_root: header.state_root,
        message_passer_storage_root: MESSAGE_PASSER_STORAGE_ROOT,
        latest_blockhash: header.hash,
    })
}

/// Tight cadences; tests run on paused tokio time
pub fn test_timing() -> FlowTiming {
    FlowTiming {
        receipt: PollConfig::fast(Duration::from_secs(1)),
        l2_confirm: PollConfig::fast(Duration::from_secs(1)).with_max_wait(Duration::from_secs(30)),
        prove: PollConfig::slow(Duration::from_secs(60)),
        finalize: PollConfig::slow(Duration::from_secs(300)),
    }
}

#[async_trait]
impl TxSubmitter for FakeChain {
    async fn sign_and_send(&self, chain: Chain, request: TxRequest) -> Result<B256, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.submissions.push(request.clone());

        let hash = match (&request, chain) {
            (TxRequest::Deposit { to, mint, value, gas_limit, data, .. }, Chain::L1) => {
                state.deposit(*to, *mint, *value, *gas_limit, data)
            }
            (TxRequest::InitiateWithdrawal { target, value, gas_limit, data }, Chain::L2) => {
                state.initiate(*target, *value, *gas_limit, data)
            }
            (TxRequest::ProveWithdrawal { withdrawal, game, .. }, Chain::L1) => {
                let now = state.now_l1;
                state
                    .proven
                    .insert(hash_withdrawal(withdrawal), (game.proxy, now));
                state.l1_success("l1-prove")
            }
            (TxRequest::FinalizeWithdrawal { withdrawal }, Chain::L1) => {
                let withdrawal_hash = hash_withdrawal(withdrawal);
                match state.finalize_mode {
                    FinalizeMode::Succeed => {
                        state.finalized.insert(withdrawal_hash);
                        state.l1_success("l1-finalize")
                    }
                    FinalizeMode::AlreadyFinalized => {
                        state.finalized.insert(withdrawal_hash);
                        return Err(ClientError::Reverted {
                            reason: "OptimismPortal: withdrawal has already been finalized".into(),
                        });
                    }
                    FinalizeMode::MinedRevert => {
                        state.finalized.insert(withdrawal_hash);
                        state.l1_revert("l1-finalize")
                    }
                    FinalizeMode::MinedRevertUnfinalized => state.l1_revert("l1-finalize"),
                }
            }
            (_, chain) => return Err(ClientError::Rejected(format!("wrong chain {chain}"))),
        };
        Ok(hash)
    }
}

#[async_trait]
impl ReceiptSource for FakeChain {
    async fn get_receipt(&self, chain: Chain, hash: B256) -> Result<Option<Receipt>, ClientError> {
        let mut state = self.state.lock().unwrap();
        if let Some(left) = state.receipt_delays.get_mut(&(chain, hash)) {
            if *left > 0 {
                *left -= 1;
                return Ok(None);
            }
        }
        Ok(state.receipts.get(&(chain, hash)).cloned())
    }
}

#[async_trait]
impl ContractReader for FakeChain {
    async fn balance(&self, _chain: Chain, _address: Address) -> Result<U256, ClientError> {
        Ok(U256::from(5u64) * U256::from(10u64).pow(U256::from(18)))
    }

    async fn latest_timestamp(&self, _chain: Chain) -> Result<u64, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.now_l1 += state.clock_step;
        Ok(state.now_l1)
    }

    async fn block(&self, _chain: Chain, number: u64) -> Result<BlockHeader, ClientError> {
        Ok(l2_header(number))
    }

    async fn storage_proof(
        &self,
        _chain: Chain,
        _address: Address,
        _slot: B256,
        _number: u64,
    ) -> Result<StorageProof, ClientError> {
        Ok(StorageProof {
            storage_hash: MESSAGE_PASSER_STORAGE_ROOT,
            proof: vec![Bytes::from_static(&[0xF8, 0x51])],
        })
    }

    async fn respected_game_type(&self) -> Result<u32, ClientError> {
        Ok(0)
    }

    async fn game_count(&self) -> Result<U256, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.game_count_calls += 1;
        let calls = state.game_count_calls;
        let visible = state.games.iter().filter(|g| calls > g.visible_after).count();
        Ok(U256::from(visible))
    }

    async fn find_latest_games(
        &self,
        _game_type: u32,
        _start: U256,
        n: U256,
    ) -> Result<Vec<RawGame>, ClientError> {
        let state = self.state.lock().unwrap();
        let calls = state.game_count_calls;
        let n = usize::try_from(n).unwrap_or(usize::MAX);
        Ok(state
            .games
            .iter()
            .filter(|g| calls > g.visible_after)
            .rev()
            .take(n)
            .map(|g| g.game.clone())
            .collect())
    }

    async fn game_status(&self, game: Address) -> Result<u8, ClientError> {
        Ok(*self.state.lock().unwrap().game_status.get(&game).unwrap_or(&0))
    }

    async fn game_resolved_at(&self, game: Address) -> Result<u64, ClientError> {
        Ok(*self.state.lock().unwrap().resolved_at.get(&game).unwrap_or(&0))
    }

    async fn proof_maturity_delay(&self) -> Result<u64, ClientError> {
        Ok(PROOF_MATURITY_DELAY)
    }

    async fn dispute_game_finality_delay(&self) -> Result<u64, ClientError> {
        Ok(GAME_FINALITY_DELAY)
    }

    async fn proven_withdrawal(
        &self,
        withdrawal_hash: B256,
        _submitter: Address,
    ) -> Result<(Address, u64), ClientError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .proven
            .get(&withdrawal_hash)
            .copied()
            .unwrap_or((Address::ZERO, 0)))
    }

    async fn finalized_withdrawal(&self, withdrawal_hash: B256) -> Result<bool, ClientError> {
        Ok(self.state.lock().unwrap().finalized.contains(&withdrawal_hash))
    }
}
