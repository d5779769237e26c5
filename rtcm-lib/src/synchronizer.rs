use std::io::Read;

use tracing::{debug, trace};

use crate::{
    bytes::Bytes,
    crc::{self, CRC_LEN},
    decoder, Error, Result,
};

/// RTCM3 frame preamble.
pub const PREAMBLE: u8 = 0xd3;
/// Preamble plus the 2 byte length field.
pub const HEADER_LEN: usize = 3;
/// Largest payload that fits the 10-bit length field.
pub const MAX_PAYLOAD_LEN: usize = 1023;

const UBX_SYNC: [u8; 2] = [0xb5, 0x62];
// second character of NMEA talker ids, e.g., GP, GN, BD
const NMEA_TALKERS: &[u8] = b"VMPBDILGFSHREYACZTW";
// NMEA sentences are at most 82 characters; allow for proprietary ones
const MAX_NMEA_LEN: usize = 256;

/// One complete RTCM3 frame: preamble, length, payload and CRC.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Frame {
    #[cfg_attr(feature = "serialize", serde(with = "serde_bytes"))]
    pub data: Vec<u8>,
    /// Byte offset of the preamble in the source stream.
    pub offset: usize,
}

impl Frame {
    /// Create a frame from raw bytes.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if `data` is shorter than the length in its header.
    pub fn new(data: Vec<u8>) -> Result<Self> {
        let minimum = HEADER_LEN + CRC_LEN;
        if data.len() < minimum {
            return Err(Error::NotEnoughData {
                actual: data.len(),
                minimum,
            });
        }
        let frame = Frame { data, offset: 0 };
        let minimum = frame.length() + HEADER_LEN + CRC_LEN;
        if frame.data.len() < minimum {
            return Err(Error::NotEnoughData {
                actual: frame.data.len(),
                minimum,
            });
        }
        Ok(frame)
    }

    /// Payload length from the frame header.
    #[must_use]
    pub fn length(&self) -> usize {
        (usize::from(self.data[1] & 0x03) << 8) | usize::from(self.data[2])
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data[HEADER_LEN..HEADER_LEN + self.length()]
    }

    /// CRC-24Q trailer value.
    #[must_use]
    pub fn crc(&self) -> u32 {
        let start = HEADER_LEN + self.length();
        let trailer = &self.data[start..start + CRC_LEN];
        u32::from_be_bytes([0, trailer[0], trailer[1], trailer[2]])
    }

    /// True if the CRC over the whole frame is 0.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        crc::crc24q(&self.data[..HEADER_LEN + self.length() + CRC_LEN]) == 0
    }

    /// Message identity of the payload.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if the payload is too short to contain an identity.
    pub fn identity(&self) -> Result<String> {
        decoder::identity(self.payload())
    }
}

/// Counters for bytes consumed by a [Synchronizer].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// RTCM3 frames emitted.
    pub frames: usize,
    /// Bytes not part of any recognized frame.
    pub discarded_bytes: usize,
    /// UBX frames skipped.
    pub ubx_frames: usize,
    /// NMEA sentences skipped.
    pub nmea_sentences: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SeekSync,
    ReadLength,
    ReadPayload(usize),
    ReadTrailer,
    Emit,
}

/// Synchronizer scans a byte stream for RTCM3 frames.
///
/// UBX frames and NMEA sentences interleaved with RTCM3 frames, as produced by many
/// GNSS receivers, are consumed and discarded. Any other bytes not part of a frame are
/// discarded.
pub struct Synchronizer<R>
where
    R: Read + Send,
{
    bytes: Bytes<R>,
    stats: SyncStats,
    done: bool,
}

impl<R> Synchronizer<R>
where
    R: Read + Send,
{
    pub fn new(reader: R) -> Self {
        Synchronizer {
            bytes: Bytes::new(reader),
            stats: SyncStats::default(),
            done: false,
        }
    }

    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Scan the stream for the next frame.
    ///
    /// Returns `Ok(None)` when the stream ends before a new frame starts.
    ///
    /// # Errors
    /// [Error::TruncatedStream] if the stream ends part way through a frame, after which
    /// all further calls return `Ok(None)`. I/O errors are returned as [Error::Io].
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.done {
            return Ok(None);
        }

        let mut state = State::SeekSync;
        let mut data: Vec<u8> = Vec::new();
        let mut offset = 0;
        loop {
            state = match state {
                State::SeekSync => {
                    let Some(b) = self.bytes.next()? else {
                        return Ok(None);
                    };
                    match b {
                        PREAMBLE => {
                            offset = self.bytes.offset() - 1;
                            data.clear();
                            data.push(b);
                            State::ReadLength
                        }
                        b if b == UBX_SYNC[0] => {
                            self.skip_ubx()?;
                            State::SeekSync
                        }
                        b'$' => {
                            self.skip_nmea()?;
                            State::SeekSync
                        }
                        _ => {
                            self.stats.discarded_bytes += 1;
                            State::SeekSync
                        }
                    }
                }
                State::ReadLength => {
                    let mut hdr = [0u8; 2];
                    self.read_exact(&mut hdr[..1])?;
                    if hdr[0] & 0xfc != 0 {
                        // reserved bits set; not a frame start
                        trace!(offset, "preamble with reserved bits set");
                        self.bytes.push(&hdr[..1]);
                        self.stats.discarded_bytes += 1;
                        State::SeekSync
                    } else {
                        self.read_exact(&mut hdr[1..])?;
                        data.extend_from_slice(&hdr);
                        State::ReadPayload(usize::from(u16::from_be_bytes(hdr)))
                    }
                }
                State::ReadPayload(len) => {
                    let start = data.len();
                    data.resize(start + len, 0);
                    self.read_exact(&mut data[start..])?;
                    State::ReadTrailer
                }
                State::ReadTrailer => {
                    let mut trailer = [0u8; CRC_LEN];
                    self.read_exact(&mut trailer)?;
                    data.extend_from_slice(&trailer);
                    State::Emit
                }
                State::Emit => {
                    self.stats.frames += 1;
                    return Ok(Some(Frame { data, offset }));
                }
            }
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let got = self.bytes.fill(buf)?;
        if got < buf.len() {
            debug!(wanted = buf.len(), got, "stream ended mid-frame");
            self.done = true;
            return Err(Error::TruncatedStream {
                wanted: buf.len(),
                got,
            });
        }
        Ok(())
    }

    /// Consume a UBX frame following its first sync byte.
    fn skip_ubx(&mut self) -> Result<()> {
        match self.bytes.next()? {
            Some(b) if b == UBX_SYNC[1] => (),
            Some(b) => {
                self.bytes.push(&[b]);
                self.stats.discarded_bytes += 1;
                return Ok(());
            }
            None => {
                self.stats.discarded_bytes += 1;
                return Ok(());
            }
        }
        // class, id, little-endian length
        let mut hdr = [0u8; 4];
        self.read_exact(&mut hdr)?;
        let len = usize::from(u16::from_le_bytes([hdr[2], hdr[3]]));
        // payload and 2 byte checksum
        let mut body = vec![0u8; len + 2];
        self.read_exact(&mut body)?;
        trace!(class = hdr[0], id = hdr[1], len, "skipped UBX frame");
        self.stats.ubx_frames += 1;
        Ok(())
    }

    /// Consume an NMEA sentence following its `$`. If no line feed follows within
    /// the maximum sentence length the bytes are returned to the stream.
    fn skip_nmea(&mut self) -> Result<()> {
        let mut sentence = Vec::new();
        match self.bytes.next()? {
            Some(b) if NMEA_TALKERS.contains(&b) => sentence.push(b),
            Some(b) => {
                self.bytes.push(&[b]);
                self.stats.discarded_bytes += 1;
                return Ok(());
            }
            None => {
                self.stats.discarded_bytes += 1;
                return Ok(());
            }
        }
        while sentence.len() < MAX_NMEA_LEN {
            match self.bytes.next()? {
                Some(b'\n') => {
                    trace!(len = sentence.len() + 2, "skipped NMEA sentence");
                    self.stats.nmea_sentences += 1;
                    return Ok(());
                }
                Some(b) => sentence.push(b),
                None => break,
            }
        }
        self.bytes.push(&sentence);
        self.stats.discarded_bytes += 1;
        Ok(())
    }
}

impl<R> IntoIterator for Synchronizer<R>
where
    R: Read + Send,
{
    type Item = Result<Frame>;
    type IntoIter = FrameIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        FrameIter { sync: self }
    }
}

/// Iterates over frames found by a [Synchronizer]. Created using
/// ``Synchronizer::into_iter``.
///
/// ## Errors
/// A truncated final frame produces one [Error::TruncatedStream] after which the
/// iterator ends. Other errors are passed on.
pub struct FrameIter<R>
where
    R: Read + Send,
{
    sync: Synchronizer<R>,
}

impl<R> FrameIter<R>
where
    R: Read + Send,
{
    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.sync.stats()
    }
}

impl<R> Iterator for FrameIter<R>
where
    R: Read + Send,
{
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.sync.next_frame().transpose()
    }
}

/// Creates an iterator that produces the RTCM3 frames in `reader`.
///
/// Frames are not validated; see [Frame::is_valid]. For decoded messages see
/// [RtcmReader](crate::RtcmReader).
///
/// # Errors
/// Any error reading from the stream is passed on.
pub fn read_frames<'a, R>(reader: R) -> impl Iterator<Item = Result<Frame>> + 'a
where
    R: Read + Send + 'a,
{
    Synchronizer::new(reader).into_iter()
}
