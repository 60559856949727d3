//! Windowed reads over a shared stream.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, MutexGuard};

/// A seekable byte source.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// A stream shared by every reader opened on one archive.
pub type SharedStream = Arc<Mutex<Box<dyn ReadSeek>>>;

/// Wrap a stream so several [`BoundedReader`]s can share it.
pub fn shared(stream: impl ReadSeek + 'static) -> SharedStream {
    Arc::new(Mutex::new(Box::new(stream)))
}

fn lock(stream: &SharedStream) -> io::Result<MutexGuard<'_, Box<dyn ReadSeek>>> {
    stream
        .lock()
        .map_err(|_| io::Error::other("shared stream lock poisoned"))
}

/// A read/seek view of `[start, start + len)` of a shared stream.
///
/// Positions are relative to the window. Reads stop at the window end and
/// seeks are clamped to `[0, len]`. Every read reseeks the shared stream while
/// holding its lock, so readers over the same archive may be interleaved.
pub struct BoundedReader {
    stream: SharedStream,
    start: u64,
    len: u64,
    pos: u64,
}

impl BoundedReader {
    /// View `len` bytes of `stream` starting at `start`.
    ///
    /// The shared stream is positioned at the window start.
    pub fn new(stream: SharedStream, start: u64, len: u64) -> io::Result<Self> {
        lock(&stream)?.seek(SeekFrom::Start(start))?;
        Ok(Self {
            stream,
            start,
            len,
            pos: 0,
        })
    }

    /// View a whole file.
    pub fn from_file(file: File) -> io::Result<Self> {
        let len = file.metadata()?.len();
        Self::new(shared(file), 0, len)
    }

    /// Window length in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Check if the window is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current offset inside the window.
    #[inline]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes left before the window end.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.len - self.pos
    }
}

impl Read for BoundedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = (self.remaining()).min(buf.len() as u64) as usize;
        if want == 0 {
            return Ok(0);
        }

        let mut stream = lock(&self.stream)?;
        stream.seek(SeekFrom::Start(self.start + self.pos))?;
        let n = stream.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for BoundedReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset.min(self.len),
            SeekFrom::Current(delta) => self.pos.saturating_add_signed(delta).min(self.len),
            SeekFrom::End(delta) => self.len.saturating_add_signed(delta).min(self.len),
        };

        lock(&self.stream)?.seek(SeekFrom::Start(self.start + target))?;
        self.pos = target;
        Ok(target)
    }
}

impl std::fmt::Debug for BoundedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedReader")
            .field("start", &self.start)
            .field("len", &self.len)
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn archive() -> SharedStream {
        shared(Cursor::new((0..=255u8).cycle().take(300).collect::<Vec<_>>()))
    }

    #[test]
    fn test_window_ends_after_len() {
        let mut reader = BoundedReader::new(archive(), 100, 10).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();

        assert_eq!(out, (100..110).collect::<Vec<u8>>());
        assert_eq!(reader.read(&mut [0u8; 4]).unwrap(), 0);
    }

    #[test]
    fn test_seek_clamps_to_window() {
        let mut reader = BoundedReader::new(archive(), 100, 10).unwrap();

        assert_eq!(reader.seek(SeekFrom::Start(50)).unwrap(), 10);
        assert_eq!(reader.seek(SeekFrom::End(5)).unwrap(), 10);
        assert_eq!(reader.seek(SeekFrom::Current(-3)).unwrap(), 7);
        assert_eq!(reader.seek(SeekFrom::Current(-20)).unwrap(), 0);
        assert_eq!(reader.seek(SeekFrom::End(-2)).unwrap(), 8);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![108, 109]);
    }

    #[test]
    fn test_construction_positions_shared_stream() {
        let stream = archive();
        let _reader = BoundedReader::new(stream.clone(), 42, 3).unwrap();
        assert_eq!(stream.lock().unwrap().stream_position().unwrap(), 42);
    }

    #[test]
    fn test_interleaved_siblings() {
        let stream = archive();
        let mut a = BoundedReader::new(stream.clone(), 10, 4).unwrap();
        let mut b = BoundedReader::new(stream, 200, 4).unwrap();

        let mut byte = [0u8; 1];
        let mut seen_a = Vec::new();
        let mut seen_b = Vec::new();
        for _ in 0..4 {
            a.read_exact(&mut byte).unwrap();
            seen_a.push(byte[0]);
            b.read_exact(&mut byte).unwrap();
            seen_b.push(byte[0]);
        }

        assert_eq!(seen_a, vec![10, 11, 12, 13]);
        assert_eq!(seen_b, vec![200, 201, 202, 203]);
    }

    #[test]
    fn test_siblings_across_threads() {
        let stream = archive();
        let handles: Vec<_> = [(0u64, 100u64), (100, 100), (200, 100)]
            .into_iter()
            .map(|(start, len)| {
                let mut reader = BoundedReader::new(stream.clone(), start, len).unwrap();
                std::thread::spawn(move || {
                    let mut out = Vec::new();
                    reader.read_to_end(&mut out).unwrap();
                    (start, out)
                })
            })
            .collect();

        for handle in handles {
            let (start, out) = handle.join().unwrap();
            let expected: Vec<u8> = (start..start + 100).map(|b| b as u8).collect();
            assert_eq!(out, expected);
        }
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"exec autoexec.cfg\n").unwrap();

        let mut reader = BoundedReader::from_file(file).unwrap();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(reader.len(), 18);
        assert_eq!(text, "exec autoexec.cfg\n");
    }
}
