use crate::error::{FilterError, Result};
use crate::format::{magic_len, read_magic, write_magic};
use crate::key::{FilterKey, KEY_RECORD_SIZE};
use rand::RngCore;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// Magic line identifying a packed key-stream file.
pub const MAGIC_KEYS: &str = "$ribbon128-keys-1.0\n";

/// A lazy, finite, restartable sequence of filter keys.
///
/// Builders pull keys one at a time and may `rewind` between construction
/// attempts; `count` must be answerable without iterating the stream.
pub trait KeySource {
    /// Number of keys the source holds.
    fn count(&self) -> u32;

    /// Restarts the stream from the first key.
    fn rewind(&mut self) -> Result<()>;

    /// Pulls the next key, or `None` once the stream is exhausted.
    fn next_key(&mut self) -> Result<Option<FilterKey>>;
}

/// Buffered reader over a packed key-stream file.
///
/// The key count is derived from the file length up front; a trailing
/// partial record does not count as a key.
#[derive(Debug)]
pub struct FileKeySource {
    reader: BufReader<File>,
    count: u32,
    read: u32,
}

impl FileKeySource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        read_magic(&mut reader, MAGIC_KEYS)?;
        let count = (len.saturating_sub(magic_len(MAGIC_KEYS))
            / KEY_RECORD_SIZE as u64) as u32;
        debug!(path = %path.as_ref().display(), count, "opened key stream");
        Ok(Self {
            reader,
            count,
            read: 0,
        })
    }
}

impl KeySource for FileKeySource {
    fn count(&self) -> u32 {
        self.count
    }

    fn rewind(&mut self) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(magic_len(MAGIC_KEYS)))?;
        self.read = 0;
        Ok(())
    }

    fn next_key(&mut self) -> Result<Option<FilterKey>> {
        if self.read >= self.count {
            return Ok(None);
        }
        let mut record = [0u8; KEY_RECORD_SIZE];
        self.reader.read_exact(&mut record)?;
        self.read += 1;
        Ok(Some(FilterKey::from_record(record)))
    }
}

/// In-memory key source for tests and small sets.
pub struct MemoryKeySource {
    keys: Vec<FilterKey>,
    pos: usize,
}

impl MemoryKeySource {
    pub fn new(keys: Vec<FilterKey>) -> Self {
        Self { keys, pos: 0 }
    }

    /// Convenience constructor from raw 128-bit values; the row-placement
    /// index is taken from the value's low 32 bits.
    pub fn from_values(values: impl IntoIterator<Item = u128>) -> Self {
        Self::new(
            values
                .into_iter()
                .map(|ribbon| FilterKey {
                    ribbon,
                    index: ribbon as u32,
                })
                .collect(),
        )
    }
}

impl KeySource for MemoryKeySource {
    fn count(&self) -> u32 {
        self.keys.len() as u32
    }

    fn rewind(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn next_key(&mut self) -> Result<Option<FilterKey>> {
        let key = self.keys.get(self.pos).copied();
        if key.is_some() {
            self.pos += 1;
        }
        Ok(key)
    }
}

/// Writes a key-stream file of `nkeys` random keys.
pub fn write_synthetic_keys(
    path: impl AsRef<Path>,
    nkeys: u32,
    rng: &mut impl RngCore,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_magic(&mut writer, MAGIC_KEYS)?;
    for _ in 0..nkeys {
        writer.write_all(&FilterKey::random(rng).to_record())?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes an explicit key list as a key-stream file.
pub fn write_keys_file(
    path: impl AsRef<Path>,
    keys: &[FilterKey],
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_magic(&mut writer, MAGIC_KEYS)?;
    for key in keys {
        writer.write_all(&key.to_record())?;
    }
    writer.flush()?;
    Ok(())
}

/// Counts the keys a file holds from its metadata alone, without iterating.
pub fn count_keys(path: impl AsRef<Path>) -> Result<u32> {
    let len = std::fs::metadata(path)?.len();
    Ok((len.saturating_sub(magic_len(MAGIC_KEYS)) / KEY_RECORD_SIZE as u64)
        as u32)
}

/// Reads `expected` keys out of a source, erroring if it runs short.
pub(crate) fn pull_key(
    source: &mut impl KeySource,
    expected: u32,
    got: u32,
) -> Result<FilterKey> {
    source
        .next_key()?
        .ok_or(FilterError::TruncatedKeySource { expected, got })
}
