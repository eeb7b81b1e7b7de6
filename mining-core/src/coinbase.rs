//! Coinbase Builder (C2, `spec.md` §4.2). Grounded on
//! `bond-core::transaction::{TxInput::coinbase, Transaction}`, extended
//! with the push-encoding and doubling-rule semantics `spec.md` requires
//! that the teacher's plain reward-coinbase constructor doesn't have.

use crate::error::{CoreError, CoreResult};
use crate::snapshot::SnapshotRecord;
use crate::transaction::{Input, Output, Transaction, MAX_COINBASE_SCRIPT_SIG};
use chain_primitives::{Amount, Hash256};

/// `push(n)`: a minimal big-endian-free length-prefixed encoding of an
/// integer onto a `script_sig`. There's no script interpreter in this
/// core (scripts are opaque bytes), so this only needs to be a stable,
/// self-describing encoding — not a consensus opcode set.
fn push_u64(out: &mut Vec<u8>, value: u64) {
    let bytes = value.to_le_bytes();
    let mut len = 8;
    while len > 1 && bytes[len - 1] == 0 {
        len -= 1;
    }
    out.push(len as u8);
    out.extend_from_slice(&bytes[..len]);
}

fn push_hash(out: &mut Vec<u8>, hash: &Hash256) {
    out.push(32);
    out.extend_from_slice(hash.as_bytes());
}

/// `OP_0`, appended after the required pushes (`spec.md` §4.2).
const OP_0: u8 = 0x00;

/// Builds `script_sig = push(height) || push(index) || [push(hash_pid)
/// only if index == 0] || OP_0` (`spec.md` §4.2, §6.6 coinbase shape) and
/// fails with `OversizedScriptSig` if the result exceeds 100 bytes.
fn build_script_sig(height: u64, index: u32, hash_pid: Option<&Hash256>) -> CoreResult<Vec<u8>> {
    let mut script_sig = Vec::new();
    push_u64(&mut script_sig, height);
    push_u64(&mut script_sig, u64::from(index));
    if index == 0 {
        if let Some(hash_pid) = hash_pid {
            push_hash(&mut script_sig, hash_pid);
        }
    }
    script_sig.push(OP_0);
    if script_sig.len() > MAX_COINBASE_SCRIPT_SIG {
        return Err(CoreError::OversizedScriptSig {
            actual: script_sig.len(),
        });
    }
    Ok(script_sig)
}

/// Doubles a non-zero snapshot amount; zero is preserved at zero
/// (`spec.md` §4.2 "doubling rule"; §9 resolves the ambiguous source
/// predicate as "double only non-zero amounts").
#[must_use]
pub fn apply_doubling_rule(amount: Amount) -> Amount {
    if amount == 0 {
        0
    } else {
        amount.saturating_mul(2)
    }
}

/// Builds a synthetic fork-mode coinbase from a transparent snapshot
/// record.
pub fn build_transparent_coinbase(
    height: u64,
    index: u32,
    amount: Amount,
    script_pubkey: Vec<u8>,
    hash_pid: Option<&Hash256>,
) -> CoreResult<Transaction> {
    let script_sig = build_script_sig(height, index, hash_pid)?;
    let doubled = apply_doubling_rule(amount);
    Ok(Transaction::new(
        1,
        vec![Input::coinbase(script_sig)],
        vec![Output::new(doubled, script_pubkey)],
        0,
    ))
}

/// Builds a synthetic fork-mode coinbase on top of an already-decoded
/// shielded transaction: its inputs/outputs are rewritten to coinbase
/// shape while shielded descriptors carry through unchanged (`spec.md`
/// §4.2, §9 open question: preserve this bit-identically, don't "fix"
/// it).
pub fn build_shielded_coinbase(
    height: u64,
    index: u32,
    mut decoded: Transaction,
    hash_pid: Option<&Hash256>,
) -> CoreResult<Transaction> {
    let script_sig = build_script_sig(height, index, hash_pid)?;
    decoded.inputs = vec![Input::coinbase(script_sig)];
    decoded.outputs = decoded
        .outputs
        .into_iter()
        .map(|out| Output::new(apply_doubling_rule(out.value), out.script_pubkey))
        .collect();
    Ok(decoded)
}

/// Builds the real standard-mode coinbase: `script_sig = push(height) ||
/// OP_0`, one output paying `miner_script_pubkey` the subsidy plus fees
/// (`spec.md` §4.5 step 4).
pub fn build_standard_coinbase(
    height: u64,
    subsidy_plus_fees: Amount,
    miner_script_pubkey: Vec<u8>,
) -> CoreResult<Transaction> {
    let mut script_sig = Vec::new();
    push_u64(&mut script_sig, height);
    script_sig.push(OP_0);
    if script_sig.len() > MAX_COINBASE_SCRIPT_SIG {
        return Err(CoreError::OversizedScriptSig {
            actual: script_sig.len(),
        });
    }
    Ok(Transaction::new(
        1,
        vec![Input::coinbase(script_sig)],
        vec![Output::new(subsidy_plus_fees, miner_script_pubkey)],
        0,
    ))
}

/// Dispatches a decoded snapshot record to the right coinbase shape.
pub fn build_coinbase_from_record(
    height: u64,
    index: u32,
    record: SnapshotRecord,
    decode_shielded: impl FnOnce(&[u8]) -> CoreResult<Transaction>,
    hash_pid: Option<&Hash256>,
) -> CoreResult<Transaction> {
    match record {
        SnapshotRecord::Transparent { amount, script } => {
            build_transparent_coinbase(height, index, amount, script, hash_pid)
        }
        SnapshotRecord::Shielded { tx_bytes } => {
            let decoded = decode_shielded(&tx_bytes)?;
            build_shielded_coinbase(height, index, decoded, hash_pid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubling_rule_preserves_zero() {
        assert_eq!(apply_doubling_rule(0), 0);
    }

    #[test]
    fn doubling_rule_doubles_nonzero() {
        assert_eq!(apply_doubling_rule(1), 2);
        assert_eq!(apply_doubling_rule(250), 500);
    }

    #[test]
    fn first_synthetic_coinbase_embeds_hash_pid() {
        let hash_pid = Hash256::keccak256(b"pid");
        let tx = build_transparent_coinbase(200, 0, 100, vec![], Some(&hash_pid)).unwrap();
        let script_sig = &tx.inputs[0].script_sig;
        let needle = {
            let mut v = vec![32u8];
            v.extend_from_slice(hash_pid.as_bytes());
            v
        };
        assert!(script_sig.windows(needle.len()).any(|w| w == needle.as_slice()));
    }

    #[test]
    fn later_synthetic_coinbases_omit_hash_pid() {
        let hash_pid = Hash256::keccak256(b"pid");
        let tx = build_transparent_coinbase(200, 1, 100, vec![], Some(&hash_pid)).unwrap();
        let script_sig = &tx.inputs[0].script_sig;
        assert!(!script_sig
            .windows(33)
            .any(|w| w[0] == 32 && &w[1..] == hash_pid.as_bytes()));
    }

    #[test]
    fn worst_case_script_sig_stays_under_the_consensus_limit() {
        let hash_pid = Hash256::keccak256(b"pid");
        let script_sig = build_script_sig(u64::MAX, 0, Some(&hash_pid)).unwrap();
        assert!(script_sig.len() <= MAX_COINBASE_SCRIPT_SIG);
    }

    #[test]
    fn standard_coinbase_pays_subsidy_plus_fees_to_miner() {
        let tx = build_standard_coinbase(101, 5_000_100, vec![0xAB]).unwrap();
        assert!(tx.is_coinbase());
        assert_eq!(tx.outputs[0].value, 5_000_100);
        assert_eq!(tx.outputs[0].script_pubkey, vec![0xAB]);
    }
}
