use thiserror::Error;

/// Error kinds surfaced at the boundaries of the gateway.
///
/// Data-plane faults (`Transient`, `Transport`, `Precondition`) never escape
/// a worker thread; they are converted to an HTTP status at the point of
/// occurrence. The remaining variants terminate startup or trigger teardown.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to bind {uri}: {source}")]
    Bind {
        uri: String,
        #[source]
        source: zmq::Error,
    },

    #[error("worker {id} failed to initialize: {reason}")]
    BringUp { id: usize, reason: String },

    #[error("transient overflow sending to downstream endpoint")]
    Transient,

    #[error("transport error: {0}")]
    Transport(#[from] zmq::Error),

    #[error("fatal error in coordinator loop: {0}")]
    Fatal(String),

    #[error("precondition failed: empty body with headers excluded")]
    Precondition,
}

pub type Result<T> = std::result::Result<T, GatewayError>;
