//! `BlockTemplate` (`spec.md` §3). Grounded on `bond-core::block::Block`
//! and `blockchain.rs::validate_block`'s shape, generalized to carry the
//! parallel `fees`/`sig_ops` arrays `spec.md` requires.

use crate::header::BlockHeader;
use crate::transaction::Transaction;
use chain_primitives::{Amount, Hash256};

/// Computes the merkle root over a template's transactions. Grounded on
/// `bond-core::block::calculate_merkle_root`'s pairwise-hash tree, with
/// the odd-node-combines-with-itself rule preserved.
#[must_use]
pub fn merkle_root(transactions: &[Transaction]) -> Hash256 {
    if transactions.is_empty() {
        return Hash256::zero();
    }
    let mut hashes: Vec<Hash256> = transactions.iter().map(Transaction::txid).collect();
    if hashes.len() == 1 {
        return hashes[0];
    }
    while hashes.len() > 1 {
        let mut next_level = Vec::with_capacity(hashes.len().div_ceil(2));
        for chunk in hashes.chunks(2) {
            let mut data = Vec::new();
            data.extend_from_slice(chunk[0].as_bytes());
            data.extend_from_slice(chunk.get(1).unwrap_or(&chunk[0]).as_bytes());
            next_level.push(Hash256::keccak256(&data));
        }
        hashes = next_level;
    }
    hashes[0]
}

/// A candidate block body plus header, shaped for solving but lacking a
/// valid proof-of-work solution (GLOSSARY "Template").
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub header: BlockHeader,
    /// Element 0 is always the coinbase (I1).
    pub transactions: Vec<Transaction>,
    /// Parallel to `transactions`; element 0 encodes the negative total
    /// fee (I2).
    pub fees: Vec<i64>,
    /// Parallel to `transactions`; element 0 is filled in last.
    pub sig_ops: Vec<usize>,
}

impl BlockTemplate {
    /// Starts a template with only the coinbase placeholder installed at
    /// index 0 — the shape both C3 and C5 begin from.
    #[must_use]
    pub fn with_placeholder_coinbase(header: BlockHeader, placeholder: Transaction) -> Self {
        Self {
            header,
            transactions: vec![placeholder],
            fees: vec![0],
            sig_ops: vec![0],
        }
    }

    #[must_use]
    pub fn coinbase(&self) -> &Transaction {
        &self.transactions[0]
    }

    /// Replaces the placeholder at index 0 with the real coinbase and
    /// sets `fees[0]` per I2 (`spec.md` §4.5 step 4).
    pub fn install_coinbase(&mut self, coinbase: Transaction, sig_ops: usize) {
        self.transactions[0] = coinbase;
        let total_fees: i64 = self.fees.iter().skip(1).sum();
        self.fees[0] = -total_fees;
        self.sig_ops[0] = sig_ops;
    }

    pub fn push(&mut self, tx: Transaction, fee: i64, sig_ops: usize) {
        self.transactions.push(tx);
        self.fees.push(fee);
        self.sig_ops.push(sig_ops);
    }

    #[must_use]
    pub fn serialized_size(&self) -> usize {
        self.transactions.iter().map(Transaction::serialized_size).sum()
    }

    #[must_use]
    pub fn total_sig_ops(&self) -> usize {
        self.sig_ops.iter().sum()
    }

    #[must_use]
    pub fn total_fees(&self) -> i64 {
        self.fees.iter().skip(1).sum()
    }

    #[must_use]
    pub fn total_subsidy_plus_fees(&self) -> Amount {
        self.coinbase().total_output_value()
    }

    /// I1: element 0 is a coinbase, nothing else is.
    #[must_use]
    pub fn satisfies_coinbase_placement(&self) -> bool {
        !self.transactions.is_empty()
            && self.transactions[0].is_coinbase()
            && self.transactions[1..].iter().all(|tx| !tx.is_coinbase())
    }

    /// I2: `fees[0] == -Σ fees[i>0]`.
    #[must_use]
    pub fn satisfies_fee_accounting(&self) -> bool {
        self.fees[0] == -self.total_fees()
    }
}
