#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A housekeeping channel id outside of the 16 entry dispatch table. This indicates the
    /// data does not match the expected wire format.
    #[error("Unknown housekeeping channel: {channel_id}")]
    UnknownChannel { channel_id: u8 },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
