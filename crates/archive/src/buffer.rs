use std::io::{self, Read, Write};

use model::ContentHash;

/// Smallest buffer size after a growth step.
pub const GROWTH_FLOOR: usize = 30_000;

// Size hints come from archive headers and may be bogus.
const MAX_INITIAL_CAPACITY: usize = 64 * 1024 * 1024;

/// Fully buffered copy of a stream that can be read any number of times.
///
/// The origin stream is drained once by [`ContentBuffer::read_from`] and never
/// touched again, so the same bytes can be hashed and then written to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentBuffer {
    data: Vec<u8>,
    pos: usize,
}

impl ContentBuffer {
    /// Drains `reader` into memory.
    ///
    /// The initial allocation follows `size_hint` when it is larger than one
    /// byte. When a correct hint fills the buffer exactly, a single byte is
    /// read ahead before growing so the common case never reallocates.
    pub fn read_from<R: Read>(mut reader: R, size_hint: Option<u64>) -> io::Result<Self> {
        let hinted = size_hint
            .filter(|&n| n > 1)
            .map(|n| usize::try_from(n).unwrap_or(MAX_INITIAL_CAPACITY).min(MAX_INITIAL_CAPACITY));
        let mut data = vec![0u8; hinted.unwrap_or(GROWTH_FLOOR)];
        let mut filled = 0;
        loop {
            if filled == data.len() {
                if hinted == Some(filled) {
                    let mut ahead = [0u8; 1];
                    if read_some(&mut reader, &mut ahead)? == 0 {
                        break;
                    }
                    grow(&mut data);
                    data[filled] = ahead[0];
                    filled += 1;
                    continue;
                }
                grow(&mut data);
            }
            let n = read_some(&mut reader, &mut data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data.truncate(filled);
        Ok(Self { data, pos: 0 })
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// Moves the read cursor back to the first byte.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn content_hash(&self) -> ContentHash {
        ContentHash::of(&self.data)
    }

    /// Rewinds and streams every buffered byte into `writer`.
    pub fn copy_to<W: Write>(&mut self, writer: &mut W) -> io::Result<u64> {
        self.rewind();
        io::copy(self, writer)
    }
}

impl Read for ContentBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.pos.min(self.data.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

fn grow(data: &mut Vec<u8>) {
    let len = data.len();
    let new_len = (len * 2).max(GROWTH_FLOOR);
    data.resize(new_len, 0);
}

fn read_some<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}
