//! Transaction shape (`spec.md` §3). Grounded on
//! `bond-core::transaction::{TxInput, TxOutput, Transaction}`, with
//! script execution dropped (scripts are opaque byte strings — script
//! verification is an excluded collaborator) and an opaque
//! `shielded_data` passthrough added, since `spec.md` §3 requires
//! shielded-transfer descriptors to be "opaque to the core; passed
//! through byte-identically".

use chain_primitives::{Amount, Hash256, OutPoint};
use serde::{Deserialize, Serialize};

/// Consensus limit on a coinbase `script_sig` (`spec.md` §4.2).
pub const MAX_COINBASE_SCRIPT_SIG: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub prev_outpoint: OutPoint,
    pub script_sig: Vec<u8>,
}

impl Input {
    #[must_use]
    pub fn coinbase(script_sig: Vec<u8>) -> Self {
        Self {
            prev_outpoint: OutPoint::null(),
            script_sig,
        }
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.prev_outpoint.is_null()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub value: Amount,
    pub script_pubkey: Vec<u8>,
}

impl Output {
    #[must_use]
    pub const fn new(value: Amount, script_pubkey: Vec<u8>) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub lock_time: u32,
    /// Shielded-transfer descriptors, opaque to the core and carried
    /// through byte-identically (`spec.md` §3, §4.2).
    pub shielded_data: Option<Vec<u8>>,
}

impl Transaction {
    #[must_use]
    pub const fn new(version: i32, inputs: Vec<Input>, outputs: Vec<Output>, lock_time: u32) -> Self {
        Self {
            version,
            inputs,
            outputs,
            lock_time,
            shielded_data: None,
        }
    }

    /// `spec.md` I1: element 0 of a template's transactions is a
    /// coinbase; exactly one input, and it's the null outpoint.
    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Canonical serialization used for hashing and size accounting.
    /// Grounded on `bond-core::transaction::Transaction::hash`'s
    /// serialize-then-hash shape (there, via `serde_json`; here the
    /// core needs byte-identical framing so it uses a flat encoding).
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            out.extend_from_slice(input.prev_outpoint.txid.as_bytes());
            out.extend_from_slice(&input.prev_outpoint.vout.to_le_bytes());
            out.extend_from_slice(&(input.script_sig.len() as u32).to_le_bytes());
            out.extend_from_slice(&input.script_sig);
        }
        out.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            out.extend_from_slice(&(output.script_pubkey.len() as u32).to_le_bytes());
            out.extend_from_slice(&output.script_pubkey);
        }
        out.extend_from_slice(&self.lock_time.to_le_bytes());
        if let Some(shielded) = &self.shielded_data {
            out.extend_from_slice(shielded);
        }
        out
    }

    #[must_use]
    pub fn txid(&self) -> Hash256 {
        Hash256::keccak256(&self.serialize())
    }

    #[must_use]
    pub fn serialized_size(&self) -> usize {
        self.serialize().len()
    }

    /// Legacy-sigop count for this transaction. A coinbase costs nothing
    /// (its input doesn't carry a spendable script); a non-coinbase
    /// output paying a P2SH-style script costs one extra sigop, folded
    /// into `legacy_sigops` here since the core treats scripts as opaque
    /// bytes rather than running a script interpreter.
    #[must_use]
    pub fn legacy_sigops(&self) -> usize {
        if self.is_coinbase() {
            return 0;
        }
        self.inputs.len() + self.outputs.len()
    }

    #[must_use]
    pub fn total_output_value(&self) -> Amount {
        self.outputs.iter().map(|o| o.value).sum()
    }
}
