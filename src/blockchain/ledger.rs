use std::collections::HashSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{
    ALLOWED_RANGE_MINUTES, BLOCK_INTERVAL_MINUTES, Block, DEFAULT_DIFFICULTY, DIFF_MIN,
    DIFFICULTY_INTERVAL, GENESIS_DATA, MINER_REWARD,
};
use crate::error::LedgerError;
use crate::storage::Storage;
use crate::transaction::{Mempool, Tx, UTxOut};

/// Minimal chain state persisted as the checkpoint.
/// Field order is part of the checkpoint encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    pub newest_hash: String,
    pub height: u64,
    pub current_difficulty: u32,
}

/// Whether the genesis block mints a reward to the node's miner address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenesisReward {
    Miner,
    NoReward,
}

/// Hash-linked chain over a [`Storage`] backend.
///
/// Only the tip, height and difficulty live in memory; every history query
/// walks the stored blocks from the tip back to genesis.
pub struct Ledger {
    state: ChainState,
    store: Box<dyn Storage>,
}

impl Ledger {
    /// Restore the chain from the store's checkpoint, or mine a genesis
    /// block if the store has none.
    pub fn open(
        store: Box<dyn Storage>,
        genesis_reward: GenesisReward,
        miner: &str,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Self {
            state: ChainState {
                newest_hash: String::new(),
                height: 0,
                current_difficulty: DEFAULT_DIFFICULTY,
            },
            store,
        };

        match ledger.store.load_checkpoint()? {
            Some(bytes) => {
                ledger.state = serde_json::from_slice(&bytes)?;
                // fail at startup rather than on the first history query
                ledger.tip()?;
                info!(
                    "restored checkpoint: height={} tip={} difficulty={}",
                    ledger.state.height, ledger.state.newest_hash, ledger.state.current_difficulty
                );
            }
            None => {
                let txs = match genesis_reward {
                    GenesisReward::Miner => vec![Tx::coinbase(miner, MINER_REWARD, 1)],
                    GenesisReward::NoReward => Vec::new(),
                };
                let mut genesis = ledger.template(txs, GENESIS_DATA)?;
                genesis.mine();
                ledger.append(genesis)?;
                info!("mined genesis block {}", ledger.state.newest_hash);
            }
        }
        Ok(ledger)
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    pub fn height(&self) -> u64 {
        self.state.height
    }

    pub fn newest_hash(&self) -> &str {
        &self.state.newest_hash
    }

    /// The block at the tip.
    pub fn tip(&self) -> Result<Block, LedgerError> {
        self.get_block(&self.state.newest_hash)?
            .ok_or_else(|| LedgerError::MissingBlock(self.state.newest_hash.clone()))
    }

    /// Unmined candidate extending the tip at the difficulty now in effect.
    pub fn template(&self, transactions: Vec<Tx>, data: &str) -> Result<Block, LedgerError> {
        Ok(Block::new(
            self.state.height + 1,
            self.state.newest_hash.clone(),
            self.difficulty()?,
            data.to_string(),
            transactions,
        ))
    }

    /// Mine `transactions` into a new block and append it.
    pub fn add_block(&mut self, transactions: Vec<Tx>) -> Result<Block, LedgerError> {
        let mut block = self.template(transactions, "")?;
        block.mine();
        self.append(block.clone())?;
        Ok(block)
    }

    /// Append a mined block as the new tip.
    ///
    /// The block and the next checkpoint are written before the in-memory
    /// state moves, so a storage failure leaves the ledger where it was.
    pub fn append(&mut self, block: Block) -> Result<(), LedgerError> {
        if block.prev_hash != self.state.newest_hash {
            return Err(LedgerError::InvalidBlock("block does not extend the current tip"));
        }
        if block.height != self.state.height + 1 {
            return Err(LedgerError::InvalidBlock("unexpected height"));
        }
        if block.difficulty != self.difficulty()? {
            return Err(LedgerError::InvalidBlock("unexpected difficulty"));
        }
        if !block.is_valid() {
            return Err(LedgerError::InvalidBlock(
                "hash does not match content or difficulty",
            ));
        }

        let next = ChainState {
            newest_hash: block.hash.clone(),
            height: block.height,
            current_difficulty: block.difficulty,
        };
        self.store.put_block(&block.hash, &serde_json::to_vec(&block)?)?;
        self.store.save_checkpoint(&serde_json::to_vec(&next)?)?;

        debug!(
            "appended block #{} hash={} difficulty={} txs={}",
            block.height,
            block.hash,
            block.difficulty,
            block.transactions.len()
        );
        self.state = next;
        Ok(())
    }

    /// Load a block by hash, re-deriving its hash and proof-of-work.
    pub fn get_block(&self, hash: &str) -> Result<Option<Block>, LedgerError> {
        let Some(bytes) = self.store.get_block(hash)? else {
            return Ok(None);
        };
        let block: Block = serde_json::from_slice(&bytes)?;
        if block.hash != hash || !block.is_valid() {
            return Err(LedgerError::CorruptBlock(hash.to_string()));
        }
        Ok(Some(block))
    }

    /// Lazily walk the chain from the tip back to genesis.
    pub fn walk(&self) -> ChainWalk<'_> {
        ChainWalk {
            ledger: self,
            cursor: (self.state.height > 0).then(|| self.state.newest_hash.clone()),
        }
    }

    /// The whole chain, newest first.
    pub fn blocks(&self) -> Result<Vec<Block>, LedgerError> {
        self.walk().collect()
    }

    /// Difficulty the next block must be mined at.
    pub fn difficulty(&self) -> Result<u32, LedgerError> {
        if self.state.height == 0 {
            Ok(DEFAULT_DIFFICULTY)
        } else if self.state.height % DIFFICULTY_INTERVAL == 0 {
            self.recalculate_difficulty()
        } else {
            Ok(self.state.current_difficulty)
        }
    }

    /// Compare the time spent on the last window of blocks against the
    /// target and nudge the difficulty by one step.
    pub fn recalculate_difficulty(&self) -> Result<u32, LedgerError> {
        let window = self
            .walk()
            .take(DIFFICULTY_INTERVAL as usize)
            .collect::<Result<Vec<_>, _>>()?;
        let (Some(newest), Some(oldest)) = (window.first(), window.last()) else {
            return Ok(self.state.current_difficulty);
        };
        let next = next_difficulty(
            self.state.current_difficulty,
            newest.timestamp,
            oldest.timestamp,
        );
        if next != self.state.current_difficulty {
            debug!(
                "difficulty {} -> {} at height {}",
                self.state.current_difficulty, next, self.state.height
            );
        }
        Ok(next)
    }

    /// Outputs owned by `address` that no committed input spends and no
    /// mempool input references. Newest block first.
    pub fn utxouts_by_address(
        &self,
        address: &str,
        mempool: &Mempool,
    ) -> Result<Vec<UTxOut>, LedgerError> {
        let blocks = self.blocks()?;

        let spent: HashSet<(&str, i64)> = blocks
            .iter()
            .flat_map(|b| &b.transactions)
            .flat_map(|tx| &tx.tx_ins)
            .filter(|input| input.owner == address)
            .map(|input| (input.tx_id.as_str(), input.index))
            .collect();

        let mut utxouts = Vec::new();
        for tx in blocks.iter().flat_map(|b| &b.transactions) {
            for (index, output) in tx.tx_outs.iter().enumerate() {
                if output.owner != address || spent.contains(&(tx.id.as_str(), index as i64)) {
                    continue;
                }
                let utxout = UTxOut {
                    tx_id: tx.id.clone(),
                    index,
                    amount: output.amount,
                };
                if !mempool.is_on_mempool(&utxout) {
                    utxouts.push(utxout);
                }
            }
        }
        Ok(utxouts)
    }

    pub fn balance_by_address(&self, address: &str, mempool: &Mempool) -> Result<u64, LedgerError> {
        Ok(self
            .utxouts_by_address(address, mempool)?
            .iter()
            .map(|u| u.amount)
            .sum())
    }

    /// Validate the entire chain: hashes, PoW, linkage and heights.
    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        let mut expected_height = self.state.height;
        for block in self.walk() {
            let block = block?;
            if expected_height == 0 || block.height != expected_height {
                return Err(LedgerError::InvalidBlock("non-consecutive block heights"));
            }
            expected_height -= 1;
        }
        if expected_height != 0 {
            return Err(LedgerError::InvalidBlock("chain does not end at genesis"));
        }
        Ok(())
    }
}

/// Negative-feedback rule: a window that finished with at least
/// `ALLOWED_RANGE_MINUTES` to spare raises difficulty, one that overran by
/// as much lowers it, never below `DIFF_MIN`. There is no ceiling.
/// Timestamps are compared in whole minutes.
pub fn next_difficulty(current: u32, newest_timestamp: i64, window_start_timestamp: i64) -> u32 {
    let actual = newest_timestamp / 60 - window_start_timestamp / 60;
    let expected = DIFFICULTY_INTERVAL as i64 * BLOCK_INTERVAL_MINUTES;
    if actual <= expected - ALLOWED_RANGE_MINUTES {
        current.saturating_add(1)
    } else if actual >= expected + ALLOWED_RANGE_MINUTES {
        current.saturating_sub(1).max(DIFF_MIN)
    } else {
        current
    }
}

/// Iterator returned by [`Ledger::walk`].
pub struct ChainWalk<'a> {
    ledger: &'a Ledger,
    cursor: Option<String>,
}

impl Iterator for ChainWalk<'_> {
    type Item = Result<Block, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.cursor.take()?;
        match self.ledger.get_block(&hash) {
            Ok(Some(block)) => {
                if !block.prev_hash.is_empty() {
                    self.cursor = Some(block.prev_hash.clone());
                }
                Some(Ok(block))
            }
            Ok(None) => Some(Err(LedgerError::MissingBlock(hash))),
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::error::StorageError;
    use crate::storage::{FileStore, MemoryStore};
    use crate::transaction::{TxIn, TxOut};
    use tempfile::TempDir;

    const MINER: &str = "miner";

    fn fresh(reward: GenesisReward) -> Ledger {
        Ledger::open(Box::new(MemoryStore::new()), reward, MINER).expect("open ledger")
    }

    /// Extend the chain with an empty block stamped at `timestamp`.
    fn append_at(ledger: &mut Ledger, timestamp: i64) {
        let mut block = ledger.template(vec![], "").unwrap();
        block.timestamp = timestamp;
        block.mine();
        ledger.append(block).unwrap();
    }

    #[test]
    fn genesis_is_deterministic() {
        for reward in [GenesisReward::Miner, GenesisReward::NoReward] {
            let ledger = fresh(reward);
            let genesis = ledger.tip().unwrap();

            assert_eq!(ledger.height(), 1);
            assert_eq!(genesis.height, 1);
            assert!(genesis.prev_hash.is_empty());
            assert_eq!(genesis.difficulty, DEFAULT_DIFFICULTY);
            assert_eq!(genesis.data, GENESIS_DATA);
            assert!(genesis.is_valid());
            assert_eq!(genesis.reward().is_some(), reward == GenesisReward::Miner);
        }
    }

    #[test]
    fn genesis_reward_policy_sets_opening_balance() {
        let mempool = Mempool::new();
        assert_eq!(
            fresh(GenesisReward::Miner).balance_by_address(MINER, &mempool).unwrap(),
            MINER_REWARD
        );
        assert_eq!(
            fresh(GenesisReward::NoReward).balance_by_address(MINER, &mempool).unwrap(),
            0
        );
    }

    #[test]
    fn spending_one_of_two_outputs_to_the_same_address_keeps_the_other() {
        let mut ledger = fresh(GenesisReward::Miner);
        let mempool = Mempool::new();
        let genesis_reward = ledger.tip().unwrap().reward().unwrap().id.clone();

        let split = Tx::new(
            vec![TxIn::new(&genesis_reward, 0, MINER)],
            vec![TxOut::new(MINER, 30), TxOut::new(MINER, 20)],
        );
        ledger.add_block(vec![split.clone()]).unwrap();
        assert_eq!(ledger.balance_by_address(MINER, &mempool).unwrap(), 50);

        let pay = Tx::new(
            vec![TxIn::new(&split.id, 1, MINER)],
            vec![TxOut::new("bob", 20)],
        );
        ledger.add_block(vec![pay]).unwrap();

        let utxouts = ledger.utxouts_by_address(MINER, &mempool).unwrap();
        assert_eq!(
            utxouts,
            vec![UTxOut {
                tx_id: split.id.clone(),
                index: 0,
                amount: 30,
            }]
        );
        assert_eq!(ledger.balance_by_address("bob", &mempool).unwrap(), 20);
        assert_eq!(
            ledger.balance_by_address(MINER, &mempool).unwrap()
                + ledger.balance_by_address("bob", &mempool).unwrap(),
            MINER_REWARD
        );
    }

    #[test]
    fn blocks_walk_from_tip_to_genesis() {
        let mut ledger = fresh(GenesisReward::NoReward);
        ledger.add_block(vec![Tx::coinbase(MINER, MINER_REWARD, 2)]).unwrap();
        ledger.add_block(vec![Tx::coinbase(MINER, MINER_REWARD, 3)]).unwrap();

        let blocks = ledger.blocks().unwrap();
        let heights: Vec<u64> = blocks.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![3, 2, 1]);
        assert_eq!(blocks[0].hash, ledger.newest_hash());
        for pair in blocks.windows(2) {
            assert_eq!(pair[0].prev_hash, pair[1].hash);
        }
        ledger.verify_chain().unwrap();
    }

    #[test]
    fn checkpoint_restores_without_new_genesis() {
        let dir = TempDir::new().expect("temp dir");
        let state = {
            let mut ledger = Ledger::open(
                Box::new(FileStore::open(dir.path()).unwrap()),
                GenesisReward::Miner,
                MINER,
            )
            .unwrap();
            ledger.add_block(vec![]).unwrap();
            ledger.state().clone()
        };

        let reopened = Ledger::open(
            Box::new(FileStore::open(dir.path()).unwrap()),
            GenesisReward::Miner,
            MINER,
        )
        .unwrap();
        assert_eq!(reopened.state(), &state);
        assert_eq!(reopened.blocks().unwrap().len(), 2);
    }

    #[test]
    fn checkpoint_pointing_at_missing_block_fails_loudly() {
        let mut store = MemoryStore::new();
        let state = ChainState {
            newest_hash: "00ff".into(),
            height: 4,
            current_difficulty: 2,
        };
        store
            .save_checkpoint(&serde_json::to_vec(&state).unwrap())
            .unwrap();

        let err = Ledger::open(Box::new(store), GenesisReward::Miner, MINER).err();
        assert!(matches!(err, Some(LedgerError::MissingBlock(h)) if h == "00ff"));
    }

    #[test]
    fn tampered_stored_block_is_rejected_on_load() {
        let mut block = Block::new(1, String::new(), 1, GENESIS_DATA.into(), vec![]);
        block.mine();
        let hash = block.hash.clone();
        block.data = "Forged".into();

        let mut store = MemoryStore::new();
        store
            .put_block(&hash, &serde_json::to_vec(&block).unwrap())
            .unwrap();
        let state = ChainState {
            newest_hash: hash.clone(),
            height: 1,
            current_difficulty: 1,
        };
        store
            .save_checkpoint(&serde_json::to_vec(&state).unwrap())
            .unwrap();

        let err = Ledger::open(Box::new(store), GenesisReward::Miner, MINER).err();
        assert!(matches!(err, Some(LedgerError::CorruptBlock(h)) if h == hash));
    }

    #[test]
    fn append_rejects_blocks_that_do_not_extend_tip() {
        let mut ledger = fresh(GenesisReward::NoReward);
        let before = ledger.state().clone();

        let mut stale = Block::new(2, "not-the-tip".into(), 2, String::new(), vec![]);
        stale.mine();
        assert!(matches!(ledger.append(stale), Err(LedgerError::InvalidBlock(_))));

        let mut wrong_height = ledger.template(vec![], "").unwrap();
        wrong_height.height = 7;
        wrong_height.mine();
        assert!(matches!(ledger.append(wrong_height), Err(LedgerError::InvalidBlock(_))));

        let mut easy = ledger.template(vec![], "").unwrap();
        easy.difficulty = 1;
        easy.mine();
        assert!(matches!(ledger.append(easy), Err(LedgerError::InvalidBlock(_))));

        // cached hash no longer matches the nonce
        let mut unmined = ledger.template(vec![], "").unwrap();
        unmined.nonce = 1;
        assert!(matches!(ledger.append(unmined), Err(LedgerError::InvalidBlock(_))));

        assert_eq!(ledger.state(), &before);
    }

    #[test]
    fn feedback_law_thresholds() {
        let start = 1_700_000_040; // 60-second aligned
        let at = |minutes: i64| start + minutes * 60;

        assert_eq!(next_difficulty(2, at(0), start), 3);
        assert_eq!(next_difficulty(2, at(8), start), 3);
        assert_eq!(next_difficulty(2, at(9), start), 2);
        assert_eq!(next_difficulty(2, at(10), start), 2);
        assert_eq!(next_difficulty(2, at(11), start), 2);
        assert_eq!(next_difficulty(2, at(12), start), 1);
        assert_eq!(next_difficulty(2, at(30), start), 1);
    }

    #[test]
    fn feedback_law_has_a_floor_but_no_ceiling() {
        assert_eq!(next_difficulty(6, 0, 0), 7);
        assert_eq!(next_difficulty(20, 0, 0), 21);
        assert_eq!(next_difficulty(DIFF_MIN, 3600, 0), DIFF_MIN);
    }

    #[test]
    fn fast_window_raises_difficulty() {
        let mut ledger = fresh(GenesisReward::NoReward);
        let start = ledger.tip().unwrap().timestamp;
        for _ in 2..=5 {
            append_at(&mut ledger, start);
        }
        assert_eq!(ledger.height(), 5);
        assert_eq!(ledger.difficulty().unwrap(), 3);

        let block = ledger.add_block(vec![]).unwrap();
        assert_eq!(block.difficulty, 3);
        assert_eq!(ledger.state().current_difficulty, 3);
        // off the interval the stored difficulty holds
        assert_eq!(ledger.difficulty().unwrap(), 3);
    }

    #[test]
    fn slow_window_lowers_difficulty() {
        let mut ledger = fresh(GenesisReward::NoReward);
        let start = ledger.tip().unwrap().timestamp;
        for k in 1..=4 {
            append_at(&mut ledger, start + k * 5 * 60);
        }
        assert_eq!(ledger.difficulty().unwrap(), 1);
    }

    #[test]
    fn on_pace_window_holds_difficulty() {
        let mut ledger = fresh(GenesisReward::NoReward);
        let start = ledger.tip().unwrap().timestamp;
        for k in 1..=4 {
            append_at(&mut ledger, start + k * 150);
        }
        assert_eq!(ledger.difficulty().unwrap(), DEFAULT_DIFFICULTY);
    }

    /// Store whose checkpoint writes can be made to fail.
    struct FlakyStore {
        inner: MemoryStore,
        fail: Arc<AtomicBool>,
    }

    impl Storage for FlakyStore {
        fn save_checkpoint(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.save_checkpoint(bytes)
        }

        fn load_checkpoint(&self) -> Result<Option<Vec<u8>>, StorageError> {
            self.inner.load_checkpoint()
        }

        fn put_block(&mut self, hash: &str, bytes: &[u8]) -> Result<(), StorageError> {
            self.inner.put_block(hash, bytes)
        }

        fn get_block(&self, hash: &str) -> Result<Option<Vec<u8>>, StorageError> {
            self.inner.get_block(hash)
        }
    }

    #[test]
    fn failed_checkpoint_leaves_tip_unchanged() {
        let fail = Arc::new(AtomicBool::new(false));
        let store = FlakyStore {
            inner: MemoryStore::new(),
            fail: fail.clone(),
        };
        let mut ledger = Ledger::open(Box::new(store), GenesisReward::Miner, MINER).unwrap();
        let before = ledger.state().clone();

        fail.store(true, Ordering::SeqCst);
        assert!(matches!(
            ledger.add_block(vec![]),
            Err(LedgerError::Storage(StorageError::Io(_)))
        ));
        assert_eq!(ledger.state(), &before);

        fail.store(false, Ordering::SeqCst);
        ledger.add_block(vec![]).unwrap();
        assert_eq!(ledger.height(), 2);
    }
}
