//! Versioned binary layout of a persisted [`WatchState`].
//!
//! ```text
//! VERSION            string   "1.0"
//! DIR_COUNT          i32
//!   DIR_PATH         string
//!   CAPTURE_TIME     i64      epoch millis, UTC
//!   FILE_COUNT       i32
//!     FILE_PATH      string
//!     EXISTS         u8       0 or 1
//!     LENGTH         i64
//!     LAST_MODIFIED  i64      epoch millis
//! ```
//!
//! Integers are big-endian. A `string` is a u16 byte length followed by that
//! many UTF-8 bytes. Paths that are not valid UTF-8 are stored lossily.

use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use chrono::DateTime;

use super::error::{StorageError, StorageResult};
use crate::snapshot::{DirectorySnapshot, FileRecord, WatchState};

/// Format tag written at the start of every snapshot file.
pub const FORMAT_VERSION: &str = "1.0";

/// Upper bound for speculative allocations driven by counts read from disk.
const PREALLOCATE_LIMIT: usize = 4096;

/// Serialize `state` to `writer`.
pub fn write_state<W: Write>(writer: &mut W, state: &WatchState) -> StorageResult<()> {
    write_string(writer, FORMAT_VERSION)?;
    writer.write_i32::<BigEndian>(to_count(state.len(), "directory")?)?;

    for snapshot in state.snapshots() {
        write_path(writer, snapshot.directory())?;
        writer.write_i64::<BigEndian>(snapshot.captured_at().timestamp_millis())?;
        writer.write_i32::<BigEndian>(to_count(snapshot.len(), "file")?)?;

        for file in snapshot.files() {
            write_path(writer, file.path())?;
            writer.write_u8(u8::from(file.exists()))?;
            let length = i64::try_from(file.length()).map_err(|_| StorageError::Unrepresentable {
                reason: format!("length of {} exceeds i64", file.path().display()),
            })?;
            writer.write_i64::<BigEndian>(length)?;
            writer.write_i64::<BigEndian>(file.last_modified())?;
        }
    }

    Ok(())
}

/// Deserialize a state from `reader`, requiring the stream to end right after it.
pub fn read_state<R: Read>(reader: &mut R) -> StorageResult<WatchState> {
    let version = read_string(reader, "format version")?;
    if version != FORMAT_VERSION {
        return Err(StorageError::VersionMismatch {
            found: version,
            expected: FORMAT_VERSION,
        });
    }

    let dir_count = read_count(reader, "directory count")?;
    let mut snapshots = Vec::with_capacity(dir_count.min(PREALLOCATE_LIMIT));

    for _ in 0..dir_count {
        let directory = read_string(reader, "directory path")?;
        let millis = reader
            .read_i64::<BigEndian>()
            .map_err(truncated("capture time"))?;
        let captured_at = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            StorageError::Corrupt {
                reason: format!("capture time {millis} is out of range"),
            }
        })?;

        let file_count = read_count(reader, "file count")?;
        let mut files = Vec::with_capacity(file_count.min(PREALLOCATE_LIMIT));
        for _ in 0..file_count {
            files.push(read_file(reader)?);
        }

        snapshots.push(DirectorySnapshot::from_parts(directory, captured_at, files));
    }

    let mut probe = [0u8; 1];
    loop {
        match reader.read(&mut probe) {
            Ok(0) => break,
            Ok(_) => {
                return Err(StorageError::Corrupt {
                    reason: "unexpected bytes after the last directory".to_string(),
                });
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(StorageError::Stream(e)),
        }
    }

    Ok(snapshots.into_iter().collect())
}

fn read_file<R: Read>(reader: &mut R) -> StorageResult<FileRecord> {
    let path = read_string(reader, "file path")?;
    let exists = match reader.read_u8().map_err(truncated("existence flag"))? {
        0 => false,
        1 => true,
        other => {
            return Err(StorageError::Corrupt {
                reason: format!("existence flag of {path} is {other}"),
            });
        }
    };
    let length = reader
        .read_i64::<BigEndian>()
        .map_err(truncated("file length"))?;
    let length = u64::try_from(length).map_err(|_| StorageError::Corrupt {
        reason: format!("negative length {length} for {path}"),
    })?;
    let last_modified = reader
        .read_i64::<BigEndian>()
        .map_err(truncated("last modified"))?;

    Ok(FileRecord::new(path, exists, length, last_modified))
}

fn write_path<W: Write>(writer: &mut W, path: &Path) -> StorageResult<()> {
    write_string(writer, &path.to_string_lossy())
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> StorageResult<()> {
    let len = u16::try_from(value.len()).map_err(|_| StorageError::Unrepresentable {
        reason: format!("{} byte string exceeds {} bytes", value.len(), u16::MAX),
    })?;
    writer.write_u16::<BigEndian>(len)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn read_string<R: Read>(reader: &mut R, context: &'static str) -> StorageResult<String> {
    let len = reader.read_u16::<BigEndian>().map_err(truncated(context))?;
    let mut bytes = vec![0u8; usize::from(len)];
    reader.read_exact(&mut bytes).map_err(truncated(context))?;
    String::from_utf8(bytes).map_err(|_| StorageError::Corrupt {
        reason: format!("{context} is not valid UTF-8"),
    })
}

fn read_count<R: Read>(reader: &mut R, context: &'static str) -> StorageResult<usize> {
    let count = reader.read_i32::<BigEndian>().map_err(truncated(context))?;
    usize::try_from(count).map_err(|_| StorageError::Corrupt {
        reason: format!("{context} is negative ({count})"),
    })
}

fn to_count(len: usize, what: &str) -> StorageResult<i32> {
    i32::try_from(len).map_err(|_| StorageError::Unrepresentable {
        reason: format!("{len} {what} entries exceed i32"),
    })
}

/// End-of-stream while a field is expected means the file was cut short.
fn truncated(context: &'static str) -> impl FnOnce(std::io::Error) -> StorageError {
    move |e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            StorageError::Truncated { context }
        } else {
            StorageError::Stream(e)
        }
    }
}
