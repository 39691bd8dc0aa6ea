use displaydoc::Display;

#[derive(Debug, Display)]
pub enum TransportError {
    /// An error during (de)serialization: {0}
    Serialization(ark_serialize::SerializationError),
    /// failed to send message to rank {0}
    Send(usize),
    /// failed to receive message from rank {0}
    Recv(usize),
    /// rank {0} is out of range for world size {1}
    InvalidRank(usize, usize),
    /// failed to establish channels: {0}
    Setup(String),
}

impl From<ark_serialize::SerializationError> for TransportError {
    fn from(e: ark_serialize::SerializationError) -> Self {
        Self::Serialization(e)
    }
}

impl ark_std::error::Error for TransportError {}
