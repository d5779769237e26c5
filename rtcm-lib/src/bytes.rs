use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};

/// Bytes provides the ability to read bytes from a reader and push them
/// back if they are not needed, i.e., Peek-and-push. The original order of
/// the bytes is preserved when pushing bytes back.
pub(crate) struct Bytes<R>
where
    R: Read + Send,
{
    reader: R,
    num_read: usize,
    cache: VecDeque<u8>,
}

impl<R> Bytes<R>
where
    R: Read + Send,
{
    pub fn new(reader: R) -> Self {
        Bytes {
            reader,
            num_read: 0,
            cache: VecDeque::new(),
        }
    }

    /// Returns the next byte, or `None` if the reader is at EOF.
    pub fn next(&mut self) -> io::Result<Option<u8>> {
        if let Some(b) = self.cache.pop_front() {
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.num_read += 1;
                    return Ok(Some(buf[0]));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Fill `buf` from the cache first, then the reader. Returns the number of bytes
    /// filled, which is only less than `buf.len()` if EOF was reached.
    pub fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut n = 0;
        while n < buf.len() {
            let Some(b) = self.cache.pop_front() else {
                break;
            };
            buf[n] = b;
            n += 1;
        }
        while n < buf.len() {
            match self.reader.read(&mut buf[n..]) {
                Ok(0) => break,
                Ok(num) => {
                    self.num_read += num;
                    n += num;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(n)
    }

    /// Push bytes back such that the next read returns `dat[0]` first.
    pub fn push(&mut self, dat: &[u8]) {
        for b in dat.iter().rev() {
            self.cache.push_front(*b);
        }
    }

    /// Number of bytes consumed from the stream, not counting bytes pushed back.
    pub fn offset(&self) -> usize {
        self.num_read - self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test() {
        let dat = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        let mut bytes = Bytes::new(&dat[..]);

        let b = bytes
            .next()
            .expect("Should have produced a byte for first call to next")
            .expect("should not be EOF");
        assert_eq!(b, 0, "first byte has bad value");
        assert_eq!(bytes.offset(), 1);

        let b = bytes
            .next()
            .expect("Should have produced a byte after second call to next")
            .expect("should not be EOF");
        assert_eq!(b, 1, "second byte has bad value");
        assert_eq!(bytes.offset(), 2);

        bytes.push(&[b]);
        assert_eq!(bytes.cache, [1]);
        assert_eq!(bytes.offset(), 1);

        let b = bytes
            .next()
            .expect("Should have produced a byte after third call to next")
            .expect("should not be EOF");
        assert_eq!(
            b, 1,
            "Byte should be the same as second call to next following a push"
        );
        assert_eq!(bytes.offset(), 2);
        assert_eq!(bytes.cache.len(), 0);

        let buf = &mut [0u8; 3][..];
        let n = bytes.fill(buf).expect("fill should not have failed");
        assert_eq!(n, 3);
        assert_eq!(bytes.offset(), 5);
        assert_eq!(buf, [2, 3, 4]);
    }

    #[test]
    fn push_preserves_order() {
        let dat = [1, 2, 3, 4, 5, 6];
        let mut bytes = Bytes::new(&dat[..]);

        let buf = &mut [0u8; 3][..];
        bytes.fill(buf).expect("fill should not have failed");
        assert_eq!(buf, [1, 2, 3]);

        bytes.push(buf);
        assert_eq!(bytes.num_read, 3, "should have still only read 3 bytes");
        assert_eq!(
            bytes.offset(),
            0,
            "but the offset should be num_read - cache.len"
        );

        let got: Vec<u8> = (0..3)
            .map(|_| bytes.next().expect("read").expect("not EOF"))
            .collect();
        assert_eq!(got, [1, 2, 3]);
    }

    #[test]
    fn fill_from_cache_then_reader() {
        let dat = [1, 2, 3, 4, 5, 6];
        let mut bytes = Bytes::new(&dat[..]);

        let buf = &mut [0u8; 3][..];
        bytes.fill(buf).expect("fill should not have failed");
        bytes.push(&buf[1..]);

        let buf = &mut [0u8; 4][..];
        let n = bytes.fill(buf).expect("fill should not have failed");
        assert_eq!(n, 4);
        assert_eq!(buf, [2, 3, 4, 5]);
        assert_eq!(bytes.num_read, 5);
        assert_eq!(bytes.offset(), 5);
    }

    #[test]
    fn fill_returns_short_count_at_eof() {
        let dat: Vec<u8> = vec![1, 2];
        let mut bytes = Bytes::new(&dat[..]);

        let buf = &mut [0u8; 3][..];
        let n = bytes.fill(buf).expect("should not fail");
        assert_eq!(n, 2, "should only fill what the reader had");
        assert_eq!(&buf[..2], [1, 2]);
    }

    #[test]
    fn next_returns_none_at_eof() {
        let dat: Vec<u8> = vec![];
        let mut bytes = Bytes::new(&dat[..]);

        assert!(bytes.next().expect("should not fail").is_none());
    }
}
