//! Versioned on-disk DAG container.
//!
//! Layout: a fixed 66-byte header followed by the raw cache element bytes
//! and then the raw dataset element bytes, every element stored as 16
//! little-endian 32-bit words. All header integers are little-endian.
//!
//! ```text
//! offset  bytes  field
//! 0       12     magic "EGIHASH_DAG\0"
//! 12      1      reserved zero
//! 13      4      major version
//! 17      4      revision
//! 21      4      minor version
//! 25      8      epoch
//! 33      8      cache_begin (= 66)
//! 41      8      cache_end
//! 49      8      dag_begin (= cache_end)
//! 57      8      dag_end
//! 65      1      reserved zero
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::info;

use crate::dag::Dag;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::params::{self, EPOCH_LENGTH, HASH_BYTES};
use crate::progress::{Phase, Reporter};

const MAGIC: [u8; 12] = *b"EGIHASH_DAG\0";

/// Major version of the container format.
pub const MAJOR_VERSION: u32 = 1;

/// Format revision; bumped with the major version on incompatible changes.
pub const REVISION: u32 = 23;

/// Minor version; informational only, not checked on load.
pub const MINOR_VERSION: u32 = 0;

/// Fixed size of the file header in bytes.
pub const HEADER_BYTES: usize = 66;

// Keeps the epoch-derived sizing arithmetic well inside usize range when
// validating hostile headers.
const MAX_FILE_EPOCH: u64 = 1 << 32;

/// Parsed and range-checked header of a DAG file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DagFileHeader {
    pub epoch: u64,
    pub cache_begin: u64,
    pub cache_end: u64,
    pub dag_begin: u64,
    pub dag_end: u64,
}

impl DagFileHeader {
    fn for_sizes(epoch: u64, cache_bytes: usize, dag_bytes: usize) -> Self {
        let cache_begin = HEADER_BYTES as u64;
        let cache_end = cache_begin + cache_bytes as u64;
        Self {
            epoch,
            cache_begin,
            cache_end,
            dag_begin: cache_end,
            dag_end: cache_end + dag_bytes as u64,
        }
    }

    fn to_bytes(self) -> [u8; HEADER_BYTES] {
        let mut out = [0u8; HEADER_BYTES];
        out[0..12].copy_from_slice(&MAGIC);
        out[13..17].copy_from_slice(&MAJOR_VERSION.to_le_bytes());
        out[17..21].copy_from_slice(&REVISION.to_le_bytes());
        out[21..25].copy_from_slice(&MINOR_VERSION.to_le_bytes());
        out[25..33].copy_from_slice(&self.epoch.to_le_bytes());
        out[33..41].copy_from_slice(&self.cache_begin.to_le_bytes());
        out[41..49].copy_from_slice(&self.cache_end.to_le_bytes());
        out[49..57].copy_from_slice(&self.dag_begin.to_le_bytes());
        out[57..65].copy_from_slice(&self.dag_end.to_le_bytes());
        out
    }

    fn parse(bytes: &[u8; HEADER_BYTES]) -> Result<Self> {
        if bytes[0..12] != MAGIC {
            return Err(Error::DagCorrupt("bad magic".into()));
        }
        let u32_at = |off: usize| {
            u32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
        };
        let u64_at = |off: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[off..off + 8]);
            u64::from_le_bytes(b)
        };
        let major = u32_at(13);
        let revision = u32_at(17);
        if major != MAJOR_VERSION || revision != REVISION {
            return Err(Error::VersionMismatch { major, revision });
        }
        Ok(Self {
            epoch: u64_at(25),
            cache_begin: u64_at(33),
            cache_end: u64_at(41),
            dag_begin: u64_at(49),
            dag_end: u64_at(57),
        })
    }

    /// Check the extents against the sizes this epoch requires and against
    /// the actual file length. Returns `(cache_bytes, dag_bytes)`.
    fn validate(&self, file_len: u64) -> Result<(usize, usize)> {
        if self.epoch >= MAX_FILE_EPOCH {
            return Err(Error::DagCorrupt(format!(
                "implausible epoch {}",
                self.epoch
            )));
        }
        if self.cache_begin != HEADER_BYTES as u64 {
            return Err(Error::DagCorrupt("cache does not follow header".into()));
        }
        if self.cache_end <= self.cache_begin {
            return Err(Error::DagCorrupt("empty cache extent".into()));
        }
        let block = self.epoch * EPOCH_LENGTH + 1;
        let cache_bytes = params::cache_size(block);
        if self.cache_end - self.cache_begin != cache_bytes as u64 {
            return Err(Error::DagCorrupt(format!(
                "cache extent is {} bytes, epoch {} requires {}",
                self.cache_end - self.cache_begin,
                self.epoch,
                cache_bytes
            )));
        }
        if self.dag_begin != self.cache_end {
            return Err(Error::DagCorrupt("DAG does not follow cache".into()));
        }
        if self.dag_end <= self.dag_begin {
            return Err(Error::DagCorrupt("empty DAG extent".into()));
        }
        let dag_bytes = params::full_size(block);
        if self.dag_end - self.dag_begin != dag_bytes as u64 {
            return Err(Error::DagCorrupt(format!(
                "DAG extent is {} bytes, epoch {} requires {}",
                self.dag_end - self.dag_begin,
                self.epoch,
                dag_bytes
            )));
        }
        if self.dag_end > file_len {
            return Err(Error::DagCorrupt("file is truncated".into()));
        }
        Ok((cache_bytes, dag_bytes))
    }
}

/// Read and fully validate the header of a DAG file without touching the
/// body.
pub fn read_header(path: &Path) -> Result<DagFileHeader> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut bytes = [0u8; HEADER_BYTES];
    reader.read_exact(&mut bytes)?;
    let header = DagFileHeader::parse(&bytes)?;
    header.validate(file_len)?;
    Ok(header)
}

/// Write `dag` (with its embedded cache) to `path`.
pub(crate) fn save(dag: &Dag, path: &Path, progress: &mut Reporter<'_>) -> Result<()> {
    let cache = dag.cache();
    let header = DagFileHeader::for_sizes(dag.epoch(), cache.size(), dag.size());
    info!(epoch = dag.epoch(), path = %path.display(), "saving DAG");

    let file = File::create(path)?;
    let mut writer = BufWriter::with_capacity(1 << 20, file);
    writer.write_all(&header.to_bytes())?;

    write_nodes(&mut writer, cache.data(), Phase::CacheSaving, progress)?;
    write_nodes(&mut writer, dag.data(), Phase::DagSaving, progress)?;
    writer.flush()?;
    Ok(())
}

/// Validated raw contents of a DAG file, ready to become fresh cache and
/// DAG instances of the declared epoch.
pub(crate) struct DagFileContents {
    pub(crate) epoch: u64,
    pub(crate) cache: Vec<Node>,
    pub(crate) dag: Vec<Node>,
}

/// Read and validate the full contents of `path`.
pub(crate) fn load(path: &Path, progress: &mut Reporter<'_>) -> Result<DagFileContents> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::with_capacity(1 << 20, file);

    let mut bytes = [0u8; HEADER_BYTES];
    reader.read_exact(&mut bytes)?;
    let header = DagFileHeader::parse(&bytes)?;
    let (cache_bytes, dag_bytes) = header.validate(file_len)?;
    info!(epoch = header.epoch, path = %path.display(), "loading DAG");

    // cache_begin == header size and dag_begin == cache_end were just
    // validated, so the body is one straight read.
    let cache = read_nodes(
        &mut reader,
        cache_bytes / HASH_BYTES,
        Phase::CacheLoading,
        progress,
    )?;
    let dag = read_nodes(
        &mut reader,
        dag_bytes / HASH_BYTES,
        Phase::DagLoading,
        progress,
    )?;

    Ok(DagFileContents {
        epoch: header.epoch,
        cache,
        dag,
    })
}

fn write_nodes(
    writer: &mut impl Write,
    nodes: &[Node],
    phase: Phase,
    progress: &mut Reporter<'_>,
) -> Result<()> {
    let n = nodes.len();
    for (i, node) in nodes.iter().enumerate() {
        writer.write_all(node.as_bytes())?;
        progress.step(i, n, phase)?;
    }
    Ok(())
}

fn read_nodes(
    reader: &mut impl Read,
    n: usize,
    phase: Phase,
    progress: &mut Reporter<'_>,
) -> Result<Vec<Node>> {
    let mut nodes: Vec<Node> = Vec::new();
    nodes
        .try_reserve_exact(n)
        .map_err(|_| Error::OutOfMemory(n * HASH_BYTES))?;
    for i in 0..n {
        let mut node = Node::ZERO;
        reader.read_exact(&mut node.0)?;
        nodes.push(node);
        progress.step(i, n, phase)?;
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, GENESIS_SEED};
    use std::fs;
    use std::sync::Arc;

    fn noop_reporter(cb: &mut dyn FnMut(usize, usize, Phase) -> bool) -> Reporter<'_> {
        Reporter::new(cb, 1)
    }

    fn small_dag(epoch: u64) -> Dag {
        let mut cb = |_: usize, _: usize, _: Phase| true;
        let mut reporter = noop_reporter(&mut cb);
        let cache = Arc::new(Cache::generate(epoch, 11, &GENESIS_SEED, &mut reporter).unwrap());
        Dag::materialize(epoch, 16, cache, &mut reporter).unwrap()
    }

    fn genesis_header() -> DagFileHeader {
        DagFileHeader::for_sizes(0, params::cache_size(1), params::full_size(1))
    }

    #[test]
    fn header_round_trips() {
        let header = genesis_header();
        let parsed = DagFileHeader::parse(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
        parsed.validate(header.dag_end).unwrap();
    }

    #[test]
    fn corrupt_magic_is_rejected() {
        let mut bytes = genesis_header().to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            DagFileHeader::parse(&bytes),
            Err(Error::DagCorrupt(_))
        ));
    }

    #[test]
    fn version_bump_is_rejected() {
        let mut bytes = genesis_header().to_bytes();
        bytes[13] = (MAJOR_VERSION + 1) as u8;
        assert!(matches!(
            DagFileHeader::parse(&bytes),
            Err(Error::VersionMismatch { .. })
        ));
        let mut bytes = genesis_header().to_bytes();
        bytes[17] = (REVISION + 1) as u8;
        assert!(matches!(
            DagFileHeader::parse(&bytes),
            Err(Error::VersionMismatch { .. })
        ));
    }

    #[test]
    fn wrong_extents_are_rejected() {
        let good = genesis_header();

        let mut header = good;
        header.cache_end -= HASH_BYTES as u64;
        assert!(matches!(
            header.validate(good.dag_end),
            Err(Error::DagCorrupt(_))
        ));

        let mut header = good;
        header.cache_end = header.cache_begin;
        assert!(matches!(
            header.validate(good.dag_end),
            Err(Error::DagCorrupt(_))
        ));

        let mut header = good;
        header.dag_begin += 1;
        header.dag_end += 1;
        assert!(matches!(
            header.validate(good.dag_end + 1),
            Err(Error::DagCorrupt(_))
        ));

        // Truncated by a single byte.
        assert!(matches!(
            good.validate(good.dag_end - 1),
            Err(Error::DagCorrupt(_))
        ));

        let mut header = good;
        header.epoch = u64::MAX;
        assert!(matches!(
            header.validate(good.dag_end),
            Err(Error::DagCorrupt(_))
        ));
    }

    #[test]
    fn save_writes_the_documented_layout() {
        let dag = small_dag(0);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.dag");

        let mut cb = |_: usize, _: usize, _: Phase| true;
        let mut reporter = noop_reporter(&mut cb);
        save(&dag, &path, &mut reporter).unwrap();

        let bytes = fs::read(&path).unwrap();
        let cache_bytes = dag.cache().size();
        assert_eq!(bytes.len(), HEADER_BYTES + cache_bytes + dag.size());
        assert_eq!(&bytes[0..12], &MAGIC);

        let header = DagFileHeader::parse(bytes[..HEADER_BYTES].try_into().unwrap()).unwrap();
        assert_eq!(header.epoch, 0);
        assert_eq!(header.cache_begin, HEADER_BYTES as u64);
        assert_eq!(header.cache_end, (HEADER_BYTES + cache_bytes) as u64);
        assert_eq!(header.dag_begin, header.cache_end);
        assert_eq!(header.dag_end, bytes.len() as u64);

        // Body is the raw element bytes, cache first.
        assert_eq!(
            &bytes[HEADER_BYTES..HEADER_BYTES + HASH_BYTES],
            dag.cache().data()[0].as_bytes()
        );
        assert_eq!(
            &bytes[HEADER_BYTES + cache_bytes..HEADER_BYTES + cache_bytes + HASH_BYTES],
            dag.data()[0].as_bytes()
        );
    }

    #[test]
    fn cancelled_save_stops_early() {
        let dag = small_dag(0);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cancelled.dag");

        let mut cb = |_: usize, _: usize, phase: Phase| phase != Phase::DagSaving;
        let mut reporter = noop_reporter(&mut cb);
        assert!(matches!(
            save(&dag, &path, &mut reporter),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.dag");
        let mut cb = |_: usize, _: usize, _: Phase| true;
        let mut reporter = noop_reporter(&mut cb);
        assert!(matches!(load(&path, &mut reporter), Err(Error::Io(_))));
    }

    #[test]
    fn short_file_with_valid_header_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.dag");
        // A genesis header over an otherwise empty file: the declared
        // extents point past the end.
        fs::write(&path, genesis_header().to_bytes()).unwrap();
        let mut cb = |_: usize, _: usize, _: Phase| true;
        let mut reporter = noop_reporter(&mut cb);
        assert!(matches!(
            load(&path, &mut reporter),
            Err(Error::DagCorrupt(_))
        ));
    }
}
