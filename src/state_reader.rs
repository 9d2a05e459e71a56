//! Chain State Reader
//!
//! Read-only view over both chains, built on the collaborator traits.
//! Answers the questions the flows wait on: is the receipt there, does a
//! dispute game cover the withdrawal block, has the challenge window
//! elapsed, was the withdrawal already finalized.
//!
//! The clock for every window check is the L1 head timestamp.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use tracing::{debug, warn};

use crate::client::{ContractReader, OutputRootProof, RawGame, ReceiptSource};
use crate::contracts::MESSAGE_PASSER_ADDRESS;
use crate::derivation::{output_root, withdrawal_storage_slot};
use crate::error::{BridgeError, Result};
use crate::types::{Chain, GameRef, GameStatus, ProvenWithdrawal, ReceiptStatus};

/// Newest games inspected per `find_game` call
pub const DEFAULT_GAME_SEARCH_DEPTH: u64 = 50;

/// Read-only chain queries shared by all flows
#[derive(Clone)]
pub struct ChainStateReader {
    receipts: Arc<dyn ReceiptSource>,
    contracts: Arc<dyn ContractReader>,
    game_search_depth: u64,
}

impl ChainStateReader {
    pub fn new(receipts: Arc<dyn ReceiptSource>, contracts: Arc<dyn ContractReader>) -> Self {
        Self {
            receipts,
            contracts,
            game_search_depth: DEFAULT_GAME_SEARCH_DEPTH,
        }
    }

    /// Change how many of the newest games `find_game` inspects
    pub fn with_game_search_depth(mut self, depth: u64) -> Self {
        self.game_search_depth = depth.max(1);
        self
    }

    /// Native balance at the latest block
    pub async fn get_balance(&self, chain: Chain, address: Address) -> Result<U256> {
        self.contracts
            .balance(chain, address)
            .await
            .map_err(|e| e.into_bridge(chain))
    }

    /// Receipt lookup, `Pending` while not mined
    pub async fn get_receipt(&self, chain: Chain, hash: B256) -> Result<ReceiptStatus> {
        let receipt = self
            .receipts
            .get_receipt(chain, hash)
            .await
            .map_err(|e| e.into_bridge(chain))?;

        Ok(match receipt {
            Some(receipt) => ReceiptStatus::Found(receipt),
            None => ReceiptStatus::Pending,
        })
    }

    /// Status of a dispute game
    pub async fn game_status(&self, game: Address) -> Result<GameStatus> {
        let raw = self
            .contracts
            .game_status(game)
            .await
            .map_err(|e| e.into_bridge(Chain::L1))?;

        GameStatus::from_u8(raw).ok_or_else(|| {
            BridgeError::transient(format!("game {game} reported unknown status {raw}"))
        })
    }

    /// Newest game of the respected type covering `l2_block` that has not
    /// been won by a challenger.
    pub async fn find_game(&self, l2_block: u64) -> Result<Option<GameRef>> {
        let game_type = self
            .contracts
            .respected_game_type()
            .await
            .map_err(|e| e.into_bridge(Chain::L1))?;
        let count = self
            .contracts
            .game_count()
            .await
            .map_err(|e| e.into_bridge(Chain::L1))?;

        if count.is_zero() {
            return Ok(None);
        }

        let n = count.min(U256::from(self.game_search_depth));
        let games = self
            .contracts
            .find_latest_games(game_type, count - U256::from(1), n)
            .await
            .map_err(|e| e.into_bridge(Chain::L1))?;

        for raw in &games {
            let Some(game) = decode_game(raw, game_type) else {
                continue;
            };
            if game.l2_block_number < l2_block {
                continue;
            }

            match self.game_status(game.proxy).await? {
                GameStatus::ChallengerWins => {
                    debug!(
                        target: "opbridge::state",
                        game = %game.proxy,
                        "skipping game won by challenger"
                    );
                }
                _ => return Ok(Some(game)),
            }
        }

        debug!(
            target: "opbridge::state",
            l2_block,
            inspected = games.len(),
            "no dispute game covers block yet"
        );
        Ok(None)
    }

    /// A dispute game covering the withdrawal block exists
    pub async fn is_provable(&self, l2_block: u64) -> Result<bool> {
        Ok(self.find_game(l2_block).await?.is_some())
    }

    /// Proof recorded by the portal for this submitter
    pub async fn proven_withdrawal(
        &self,
        withdrawal_hash: B256,
        submitter: Address,
    ) -> Result<Option<ProvenWithdrawal>> {
        let (game_proxy, timestamp) = self
            .contracts
            .proven_withdrawal(withdrawal_hash, submitter)
            .await
            .map_err(|e| e.into_bridge(Chain::L1))?;

        if timestamp == 0 {
            return Ok(None);
        }

        Ok(Some(ProvenWithdrawal {
            withdrawal_hash,
            submitter,
            game_proxy,
            timestamp,
        }))
    }

    /// Withdrawal already finalized on L1
    pub async fn is_finalized(&self, withdrawal_hash: B256) -> Result<bool> {
        self.contracts
            .finalized_withdrawal(withdrawal_hash)
            .await
            .map_err(|e| e.into_bridge(Chain::L1))
    }

    /// Both the proof maturity delay and the game finality delay have elapsed.
    ///
    /// Fails with `ChallengeDetected` once the proving game resolved for the
    /// challenger; that withdrawal can never finalize with this proof.
    pub async fn is_finalizable(&self, proven: &ProvenWithdrawal) -> Result<bool> {
        let status = self.game_status(proven.game_proxy).await?;
        if status == GameStatus::ChallengerWins {
            return Err(BridgeError::ChallengeDetected {
                withdrawal_hash: proven.withdrawal_hash,
                game: proven.game_proxy,
            });
        }

        let now = self
            .contracts
            .latest_timestamp(Chain::L1)
            .await
            .map_err(|e| e.into_bridge(Chain::L1))?;
        let maturity = self
            .contracts
            .proof_maturity_delay()
            .await
            .map_err(|e| e.into_bridge(Chain::L1))?;

        // the portal requires strictly more than the delay to have passed
        if now <= proven.timestamp.saturating_add(maturity) {
            debug!(
                target: "opbridge::state",
                now,
                ready_after = proven.timestamp.saturating_add(maturity),
                "proof not mature"
            );
            return Ok(false);
        }

        if status != GameStatus::DefenderWins {
            return Ok(false);
        }

        let resolved_at = self
            .contracts
            .game_resolved_at(proven.game_proxy)
            .await
            .map_err(|e| e.into_bridge(Chain::L1))?;
        let finality = self
            .contracts
            .dispute_game_finality_delay()
            .await
            .map_err(|e| e.into_bridge(Chain::L1))?;

        Ok(resolved_at > 0 && now > resolved_at.saturating_add(finality))
    }

    /// Output root preimage and storage proof for proving a withdrawal
    /// against `game`.
    pub async fn build_prove_args(
        &self,
        withdrawal_hash: B256,
        game: &GameRef,
    ) -> Result<(OutputRootProof, Vec<Bytes>)> {
        let block = self
            .contracts
            .block(Chain::L2, game.l2_block_number)
            .await
            .map_err(|e| e.into_bridge(Chain::L2))?;
        let proof = self
            .contracts
            .storage_proof(
                Chain::L2,
                MESSAGE_PASSER_ADDRESS,
                withdrawal_storage_slot(withdrawal_hash),
                game.l2_block_number,
            )
            .await
            .map_err(|e| e.into_bridge(Chain::L2))?;

        let output_root_proof = OutputRootProof {
            version: B256::ZERO,
            state_root: block.state_root,
            message_passer_storage_root: proof.storage_hash,
            latest_blockhash: block.hash,
        };

        let computed = output_root(&output_root_proof);
        if computed != game.root_claim {
            warn!(
                target: "opbridge::state",
                l2_block = game.l2_block_number,
                computed = %computed,
                claimed = %game.root_claim,
                "output root mismatch, node may lag"
            );
            return Err(BridgeError::transient(format!(
                "output root at L2 block {} does not match game {}",
                game.l2_block_number, game.proxy
            )));
        }

        Ok((output_root_proof, proof.proof))
    }
}

/// Unpack a factory search entry. Entries of another type or with a short
/// `extraData` are skipped.
fn decode_game(raw: &RawGame, game_type: u32) -> Option<GameRef> {
    let meta = raw.metadata.as_slice();
    let mut ty = [0u8; 4];
    ty.copy_from_slice(&meta[0..4]);
    if u32::from_be_bytes(ty) != game_type {
        return None;
    }
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&meta[4..12]);
    let proxy = Address::from_slice(&meta[12..32]);

    let l2_block = raw.extra_data.get(0..32).map(U256::from_be_slice)?;
    let l2_block_number = u64::try_from(l2_block).ok()?;

    Some(GameRef {
        index: raw.index,
        proxy,
        l2_block_number,
        root_claim: raw.root_claim,
        timestamp: u64::from_be_bytes(ts),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::{
        BlockHeader, ClientError, MockContractReader, MockReceiptSource, StorageProof,
    };
    use crate::error::ErrorKind;

    pub(crate) fn raw_game(index: u64, game_type: u32, proxy: Address, l2_block: u64) -> RawGame {
        let mut meta = [0u8; 32];
        meta[0..4].copy_from_slice(&game_type.to_be_bytes());
        meta[4..12].copy_from_slice(&1_700_000_000u64.to_be_bytes());
        meta[12..].copy_from_slice(proxy.as_slice());

        RawGame {
            index: U256::from(index),
            metadata: B256::from(meta),
            timestamp: U256::from(1_700_000_000u64),
            root_claim: B256::repeat_byte(index as u8),
            extra_data: Bytes::copy_from_slice(&U256::from(l2_block).to_be_bytes::<32>()),
        }
    }

    fn reader(contracts: MockContractReader) -> ChainStateReader {
        ChainStateReader::new(Arc::new(MockReceiptSource::new()), Arc::new(contracts))
    }

    fn game_factory(games: Vec<RawGame>) -> MockContractReader {
        let mut contracts = MockContractReader::new();
        let count = games.len() as u64;
        contracts.expect_respected_game_type().returning(|| Ok(0));
        contracts
            .expect_game_count()
            .returning(move || Ok(U256::from(count)));
        contracts
            .expect_find_latest_games()
            .returning(move |_, _, _| Ok(games.clone()));
        contracts
    }

    #[tokio::test]
    async fn test_receipt_pending_and_found() {
        let mut receipts = MockReceiptSource::new();
        receipts
            .expect_get_receipt()
            .returning(|_, _| Ok(None));
        let reader = ChainStateReader::new(Arc::new(receipts), Arc::new(MockContractReader::new()));

        let status = reader.get_receipt(Chain::L1, B256::ZERO).await.unwrap();
        assert_eq!(status, ReceiptStatus::Pending);
    }

    #[tokio::test]
    async fn test_transport_failure_is_transient() {
        let mut contracts = MockContractReader::new();
        contracts
            .expect_balance()
            .returning(|_, _| Err(ClientError::Transport("connection refused".into())));

        let err = reader(contracts)
            .get_balance(Chain::L2, Address::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_find_game_picks_newest_covering_game() {
        let newest = Address::repeat_byte(0x03);
        let older = Address::repeat_byte(0x02);
        let mut contracts = game_factory(vec![
            raw_game(2, 0, newest, 1_200),
            raw_game(1, 0, older, 1_100),
            raw_game(0, 0, Address::repeat_byte(0x01), 900),
        ]);
        contracts.expect_game_status().returning(|_| Ok(0));

        let game = reader(contracts).find_game(1_000).await.unwrap().unwrap();
        assert_eq!(game.proxy, newest);
        assert_eq!(game.l2_block_number, 1_200);
        assert_eq!(game.index, U256::from(2));
        assert_eq!(game.timestamp, 1_700_000_000);
    }

    #[tokio::test]
    async fn test_find_game_skips_challenged_games() {
        let challenged = Address::repeat_byte(0x03);
        let honest = Address::repeat_byte(0x02);
        let mut contracts = game_factory(vec![
            raw_game(2, 0, challenged, 1_200),
            raw_game(1, 0, honest, 1_000),
        ]);
        contracts
            .expect_game_status()
            .returning(move |game| Ok(if game == challenged { 1 } else { 2 }));

        let game = reader(contracts).find_game(1_000).await.unwrap().unwrap();
        assert_eq!(game.proxy, honest);
    }

    #[tokio::test]
    async fn test_not_provable_until_game_covers_block() {
        let mut contracts = game_factory(vec![raw_game(0, 0, Address::repeat_byte(0x01), 900)]);
        contracts.expect_game_status().never();

        assert!(!reader(contracts).is_provable(1_000).await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_game_type_is_ignored() {
        let mut contracts = game_factory(vec![raw_game(0, 1, Address::repeat_byte(0x01), 2_000)]);
        contracts.expect_game_status().never();

        assert!(reader(contracts).find_game(1_000).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_factory() {
        let mut contracts = MockContractReader::new();
        contracts.expect_respected_game_type().returning(|| Ok(0));
        contracts.expect_game_count().returning(|| Ok(U256::ZERO));
        contracts.expect_find_latest_games().never();

        assert!(reader(contracts).find_game(1).await.unwrap().is_none());
    }

    fn proven(timestamp: u64) -> ProvenWithdrawal {
        ProvenWithdrawal {
            withdrawal_hash: B256::repeat_byte(0x77),
            submitter: Address::repeat_byte(0x01),
            game_proxy: Address::repeat_byte(0x05),
            timestamp,
        }
    }

    fn window(now: u64, status: u8, resolved_at: u64) -> MockContractReader {
        let mut contracts = MockContractReader::new();
        contracts.expect_game_status().returning(move |_| Ok(status));
        contracts
            .expect_latest_timestamp()
            .returning(move |_| Ok(now));
        contracts.expect_proof_maturity_delay().returning(|| Ok(604_800));
        contracts
            .expect_game_resolved_at()
            .returning(move |_| Ok(resolved_at));
        contracts
            .expect_dispute_game_finality_delay()
            .returning(|| Ok(302_400));
        contracts
    }

    #[tokio::test]
    async fn test_finalizable_window() {
        let proof_time = 1_000_000;
        let matured = proof_time + 604_800;

        // proof not mature
        let r = reader(window(matured - 1, 2, proof_time));
        assert!(!r.is_finalizable(&proven(proof_time)).await.unwrap());

        // mature, game still in progress
        let r = reader(window(matured + 1, 0, 0));
        assert!(!r.is_finalizable(&proven(proof_time)).await.unwrap());

        // mature, resolved but finality delay not over
        let r = reader(window(matured + 1, 2, matured - 100));
        assert!(!r.is_finalizable(&proven(proof_time)).await.unwrap());

        // mature and final
        let r = reader(window(matured + 302_401, 2, matured));
        assert!(r.is_finalizable(&proven(proof_time)).await.unwrap());
    }

    #[tokio::test]
    async fn test_finalizable_window_boundaries() {
        let proof_time = 1_000_000;
        let matured = proof_time + 604_800;

        // exactly the maturity delay after the proof is still too early
        let r = reader(window(matured, 2, proof_time));
        assert!(!r.is_finalizable(&proven(proof_time)).await.unwrap());
        let r = reader(window(matured + 1, 2, proof_time));
        assert!(r.is_finalizable(&proven(proof_time)).await.unwrap());

        // exactly the finality delay after resolution is still too early
        let resolved = matured + 1 - 302_400;
        let r = reader(window(matured + 1, 2, resolved));
        assert!(!r.is_finalizable(&proven(proof_time)).await.unwrap());
        let r = reader(window(matured + 1, 2, resolved - 1));
        assert!(r.is_finalizable(&proven(proof_time)).await.unwrap());
    }

    #[tokio::test]
    async fn test_challenge_detected() {
        let r = reader(window(2_000_000, 1, 1_500_000));
        let err = r.is_finalizable(&proven(1_000_000)).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ChallengeDetected { game, .. } if game == Address::repeat_byte(0x05)
        ));
    }

    #[tokio::test]
    async fn test_proven_withdrawal_zero_timestamp_is_absent() {
        let mut contracts = MockContractReader::new();
        contracts
            .expect_proven_withdrawal()
            .returning(|_, _| Ok((Address::ZERO, 0)));
        let r = reader(contracts);
        assert!(r
            .proven_withdrawal(B256::ZERO, Address::ZERO)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_build_prove_args_checks_output_root() {
        let block = BlockHeader {
            number: 1_200,
            hash: B256::repeat_byte(0xB1),
            state_root: B256::repeat_byte(0x51),
            timestamp: 1_700_000_000,
        };
        let storage = StorageProof {
            storage_hash: B256::repeat_byte(0x5A),
            proof: vec![Bytes::from_static(&[0xC0])],
        };
        let expected = OutputRootProof {
            version: B256::ZERO,
            state_root: block.state_root,
            message_passer_storage_root: storage.storage_hash,
            latest_blockhash: block.hash,
        };

        let mut contracts = MockContractReader::new();
        let b = block.clone();
        contracts.expect_block().returning(move |_, _| Ok(b.clone()));
        let s = storage.clone();
        contracts
            .expect_storage_proof()
            .withf(|chain, address, _, number| {
                *chain == Chain::L2 && *address == MESSAGE_PASSER_ADDRESS && *number == 1_200
            })
            .returning(move |_, _, _, _| Ok(s.clone()));
        let r = reader(contracts);

        let mut game = GameRef {
            index: U256::from(2),
            proxy: Address::repeat_byte(0x03),
            l2_block_number: 1_200,
            root_claim: output_root(&expected),
            timestamp: 0,
        };
        let (proof, nodes) = r.build_prove_args(B256::repeat_byte(0x77), &game).await.unwrap();
        assert_eq!(proof, expected);
        assert_eq!(nodes, storage.proof);

        game.root_claim = B256::repeat_byte(0xEE);
        let err = r.build_prove_args(B256::repeat_byte(0x77), &game).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }
}
