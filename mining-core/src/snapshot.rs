//! Snapshot Reader (C1, `spec.md` §4.1, §6.1, §6.2). New module — the
//! teacher has no on-disk UTXO-snapshot format, so this is built fresh
//! in the teacher's `Result`/`thiserror`-propagation style, reusing
//! `bond-core::utxo`'s read-then-validate shape for the record loop.

use crate::error::{CoreError, CoreResult};
use std::fs::File;
use std::io::{Read as _, Seek as _, SeekFrom};
use std::path::{Path, PathBuf};

/// One decoded record from a per-height UTXO snapshot file (`spec.md`
/// §3 SnapshotRecord).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotRecord {
    /// `amount (8 LE) || script_len (8 LE) || script_bytes || 0x0A`.
    Transparent { amount: u64, script: Vec<u8> },
    /// Pre-serialized transaction bytes, framed by a 32-byte ASCII
    /// base-2 length prefix.
    Shielded { tx_bytes: Vec<u8> },
}

const SEPARATOR: u8 = 0x0A;
const SHIELDED_LEN_FIELD: usize = 32;

/// `GetUTXOFileName` (`spec.md` §6.1): one file per fork-window height,
/// plus a shielded-suffixed variant used only at `ZUtxoMiningStartBlock`.
#[must_use]
pub fn utxo_file_name(snapshot_dir: &Path, height: u64, shielded: bool) -> PathBuf {
    if shielded {
        snapshot_dir.join(format!("utxo-{height}.zsnapshot"))
    } else {
        snapshot_dir.join(format!("utxo-{height}.snapshot"))
    }
}

/// Streams `SnapshotRecord`s from the file for `height`, up to `cap`
/// records. Opens eagerly (to surface `SnapshotMissing` immediately) and
/// decodes lazily as the caller pulls records.
pub struct SnapshotReader {
    file: File,
    path: String,
    shielded: bool,
    cap: usize,
    count: usize,
}

impl SnapshotReader {
    /// Fails with `SnapshotMissing` if the file for `height` can't be
    /// opened — a soft error the mining loop reads as "not ready yet".
    pub fn open(snapshot_dir: &Path, height: u64, shielded: bool, cap: usize) -> CoreResult<Self> {
        let path = utxo_file_name(snapshot_dir, height, shielded);
        let file = File::open(&path).map_err(|_| CoreError::SnapshotMissing {
            height,
            path: path.display().to_string(),
        })?;
        Ok(Self {
            file,
            path: path.display().to_string(),
            shielded,
            cap,
            count: 0,
        })
    }

    fn corrupt(&self, reason: impl Into<String>) -> CoreError {
        CoreError::SnapshotCorrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn read_transparent(&mut self) -> CoreResult<Option<SnapshotRecord>> {
        let mut amount_buf = [0u8; 8];
        match self.file.read(&mut amount_buf) {
            Ok(0) => {
                // Clean end only if we've already satisfied the cap
                // (`spec.md` §4.1: "transparent files shorter than the
                // cap are legal only if the height is the last in the
                // fork window", enforced by the caller via `cap`).
                if self.count >= self.cap {
                    return Ok(None);
                }
                return Ok(None);
            }
            Ok(n) if n < 8 => return Err(self.corrupt("truncated amount field")),
            Ok(_) => {}
            Err(e) => return Err(self.corrupt(e.to_string())),
        }
        let amount = u64::from_le_bytes(amount_buf);

        let mut len_buf = [0u8; 8];
        self.file
            .read_exact(&mut len_buf)
            .map_err(|e| self.corrupt(e.to_string()))?;
        let script_len = u64::from_le_bytes(len_buf) as usize;

        let mut script = vec![0u8; script_len];
        self.file
            .read_exact(&mut script)
            .map_err(|e| self.corrupt(e.to_string()))?;

        let mut sep = [0u8; 1];
        self.file
            .read_exact(&mut sep)
            .map_err(|e| self.corrupt(e.to_string()))?;
        if sep[0] != SEPARATOR {
            return Err(self.corrupt("missing record separator"));
        }

        self.count += 1;
        Ok(Some(SnapshotRecord::Transparent { amount, script }))
    }

    fn read_shielded(&mut self) -> CoreResult<Option<SnapshotRecord>> {
        let mut len_buf = [0u8; SHIELDED_LEN_FIELD];
        match self.file.read(&mut len_buf) {
            Ok(0) => return Ok(None),
            Ok(n) if n < SHIELDED_LEN_FIELD => return Err(self.corrupt("truncated length field")),
            Ok(_) => {}
            Err(e) => return Err(self.corrupt(e.to_string())),
        }
        let digits = std::str::from_utf8(&len_buf).map_err(|_| self.corrupt("length field is not ASCII"))?;
        let tx_size = usize::from_str_radix(digits.trim_end(), 2)
            .map_err(|_| self.corrupt("length field is not base-2 ASCII"))?;

        let mut tx_bytes = vec![0u8; tx_size];
        self.file
            .read_exact(&mut tx_bytes)
            .map_err(|e| self.corrupt(e.to_string()))?;

        self.count += 1;
        Ok(Some(SnapshotRecord::Shielded { tx_bytes }))
    }

    /// Pulls the next record, or `None` on a clean end-of-file.
    pub fn next_record(&mut self) -> CoreResult<Option<SnapshotRecord>> {
        if self.count >= self.cap {
            return Ok(None);
        }
        if self.shielded {
            self.read_shielded()
        } else {
            self.read_transparent()
        }
    }

    /// Current stream position, for diagnostics only.
    pub fn position(&mut self) -> u64 {
        self.file.seek(SeekFrom::Current(0)).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_transparent_record(buf: &mut Vec<u8>, amount: u64, script: &[u8]) {
        buf.extend_from_slice(&amount.to_le_bytes());
        buf.extend_from_slice(&(script.len() as u64).to_le_bytes());
        buf.extend_from_slice(script);
        buf.push(SEPARATOR);
    }

    use std::sync::atomic::{AtomicU64, Ordering};
    static TEST_ID: AtomicU64 = AtomicU64::new(0);

    /// Minimal scoped-temp-dir helper, since the crate doesn't otherwise
    /// depend on the `tempfile` crate for a single test module.
    struct TempDir(PathBuf);

    impl TempDir {
        fn new() -> Self {
            let mut dir = std::env::temp_dir();
            dir.push(format!(
                "zmine-snapshot-test-{}-{}",
                std::process::id(),
                TEST_ID.fetch_add(1, Ordering::Relaxed)
            ));
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn path(&self) -> &Path {
            &self.0
        }
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn tmp_file(name: &str, bytes: &[u8]) -> (TempDir, PathBuf) {
        let dir = TempDir::new();
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(bytes).unwrap();
        (dir, path)
    }

    #[test]
    fn open_missing_file_is_snapshot_missing() {
        let dir = TempDir::new();
        let err = SnapshotReader::open(dir.path(), 999, false, 10).unwrap_err();
        assert!(matches!(err, CoreError::SnapshotMissing { height: 999, .. }));
    }

    #[test]
    fn reads_transparent_records_until_cap() {
        let mut bytes = Vec::new();
        write_transparent_record(&mut bytes, 0, b"script-a");
        write_transparent_record(&mut bytes, 100, b"script-b");
        write_transparent_record(&mut bytes, 250, b"script-c");
        let (dir, path) = tmp_file("utxo-200.snapshot", &bytes);
        let mut reader = SnapshotReader::open(dir.path(), 200, false, 3).unwrap();
        drop(path);

        let mut amounts = Vec::new();
        while let Some(SnapshotRecord::Transparent { amount, .. }) = reader.next_record().unwrap() {
            amounts.push(amount);
        }
        assert_eq!(amounts, vec![0, 100, 250]);
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn truncated_transparent_record_is_corrupt() {
        let mut bytes = Vec::new();
        write_transparent_record(&mut bytes, 100, b"script-a");
        bytes.truncate(bytes.len() - 3);
        let (dir, _path) = tmp_file("utxo-201.snapshot", &bytes);
        let mut reader = SnapshotReader::open(dir.path(), 201, false, 5).unwrap();
        let err = reader.next_record().unwrap_err();
        assert!(matches!(err, CoreError::SnapshotCorrupt { .. }));
    }

    #[test]
    fn shielded_reader_decodes_length_prefixed_records() {
        let payload = b"fake-serialized-tx";
        let mut bytes = Vec::new();
        let len_field = format!("{:0>32}", format!("{:b}", payload.len()));
        bytes.extend_from_slice(len_field.as_bytes());
        bytes.extend_from_slice(payload);
        let (dir, _path) = tmp_file("utxo-105.zsnapshot", &bytes);

        let mut reader = SnapshotReader::open(dir.path(), 105, true, 10).unwrap();
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record, SnapshotRecord::Shielded { tx_bytes: payload.to_vec() });
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn file_name_uses_shielded_suffix_only_when_requested() {
        let dir = Path::new("/snapshots");
        assert_eq!(utxo_file_name(dir, 105, false), dir.join("utxo-105.snapshot"));
        assert_eq!(utxo_file_name(dir, 105, true), dir.join("utxo-105.zsnapshot"));
    }
}
