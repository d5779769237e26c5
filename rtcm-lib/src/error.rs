#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Not enough bytes")]
    NotEnoughData { actual: usize, minimum: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The byte source ended part way through a frame.
    #[error("stream terminated unexpectedly; {wanted} bytes requested, {got} bytes returned")]
    TruncatedStream { wanted: usize, got: usize },

    /// CRC-24Q over the received frame is not zero.
    #[error("invalid checksum; expected 0x{expected:06x}, got 0x{actual:06x}")]
    Checksum { expected: u32, actual: u32 },

    #[error("bit cursor out of range; wanted {wanted} bits, {remaining} remaining")]
    OutOfRange { wanted: usize, remaining: usize },

    /// Schema and bit stream disagree, e.g., a field runs past the end of the payload or a
    /// group count references a field that has not been decoded.
    #[error("error decoding {field} in message type {identity}: {reason}")]
    Decode {
        identity: String,
        field: String,
        reason: String,
    },

    #[error("error encoding {field}: {reason}")]
    Encode { field: String, reason: String },

    #[error("message type {identity} is not an MSM message")]
    NotAnMsmMessage { identity: String },

    #[error("message is immutable; updates to {name} not permitted after construction")]
    Immutable { name: String },

    #[error("unknown data field {name}")]
    UnknownField { name: String },

    #[error("invalid schema: {0}")]
    Schema(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
