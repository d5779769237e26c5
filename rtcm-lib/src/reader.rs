use std::io::Read;

use tracing::error;

use crate::{
    synchronizer::{Frame, SyncStats, Synchronizer},
    DecodeOptions, Decoder, Error, Message, Result,
};

/// What an [RtcmReader] does with errors other than I/O errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Return the error to the caller.
    Raise,
    /// Report the error to the error handler, or log it if there is no handler, and
    /// continue with the next frame.
    #[default]
    Log,
    /// Continue with the next frame.
    Ignore,
}

/// Callback for errors handled under [ErrorPolicy::Log].
pub type ErrorHandler = Box<dyn FnMut(&Error) + Send>;

/// Reads frames from a byte stream and decodes them into [Message]s.
///
/// # Example
/// ```
/// use rtcm::{ErrorPolicy, RtcmReader};
///
/// let dat = hex::decode("d300044ce00080ededd6").unwrap();
/// let mut reader = RtcmReader::new(&dat[..]).with_policy(ErrorPolicy::Raise);
/// let (frame, msg) = reader.read().unwrap().unwrap();
/// assert_eq!(frame.data, dat);
/// assert_eq!(msg.unwrap().identity(), "1230");
/// assert!(reader.read().unwrap().is_none());
/// ```
pub struct RtcmReader<R>
where
    R: Read + Send,
{
    sync: Synchronizer<R>,
    decoder: Decoder,
    policy: ErrorPolicy,
    handler: Option<ErrorHandler>,
    parsing: bool,
}

impl<R> RtcmReader<R>
where
    R: Read + Send,
{
    /// Create a reader using the built-in registry, default decode options and
    /// [ErrorPolicy::Log].
    pub fn new(reader: R) -> Self {
        RtcmReader {
            sync: Synchronizer::new(reader),
            decoder: Decoder::default(),
            policy: ErrorPolicy::default(),
            handler: None,
            parsing: true,
        }
    }

    #[must_use]
    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = decoder;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: DecodeOptions) -> Self {
        self.decoder = self.decoder.with_options(options);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the callback used for errors under [ErrorPolicy::Log].
    #[must_use]
    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&Error) + Send + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// If false, frames are returned without being decoded or validated.
    #[must_use]
    pub fn with_parsing(mut self, parsing: bool) -> Self {
        self.parsing = parsing;
        self
    }

    #[must_use]
    pub fn stats(&self) -> SyncStats {
        self.sync.stats()
    }

    /// Read the next frame and, if parsing is enabled, its decoded message.
    ///
    /// Returns `Ok(None)` at the end of the stream, including after a truncated final
    /// frame.
    ///
    /// # Errors
    /// I/O errors are always returned. Other errors, e.g., [Error::Checksum] or
    /// [Error::TruncatedStream], are only returned for [ErrorPolicy::Raise].
    pub fn read(&mut self) -> Result<Option<(Frame, Option<Message>)>> {
        loop {
            let frame = match self.sync.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(None),
                Err(err) => {
                    self.handle(err)?;
                    continue;
                }
            };
            if !self.parsing {
                return Ok(Some((frame, None)));
            }
            match self.decoder.parse(&frame.data) {
                Ok(msg) => return Ok(Some((frame, Some(msg)))),
                Err(err) => self.handle(err)?,
            }
        }
    }

    fn handle(&mut self, err: Error) -> Result<()> {
        if matches!(err, Error::Io(_)) {
            return Err(err);
        }
        match self.policy {
            ErrorPolicy::Raise => Err(err),
            ErrorPolicy::Log => {
                match self.handler.as_mut() {
                    Some(handler) => handler(&err),
                    None => error!(%err, "skipping frame"),
                }
                Ok(())
            }
            ErrorPolicy::Ignore => Ok(()),
        }
    }
}

impl<R> Iterator for RtcmReader<R>
where
    R: Read + Send,
{
    type Item = Result<(Frame, Option<Message>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}
