//! Remote object error types

use super::fault::Fault;
use thiserror::Error;

/// Result type for remote object operations
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Remote object errors
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Underlying transport error
    #[error("transport error: {0}")]
    Transport(#[from] remote_transport::TransportError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not open a connection to the endpoint
    #[error("connection refused to {endpoint}: {source}")]
    ConnectFailed {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// The target object is not exported at the endpoint
    #[error("no such object in table: {0}")]
    NoSuchObject(String),

    /// Unexport of an object that was never exported, or already removed
    #[error("object not exported: {0}")]
    NotExported(String),

    /// Export of an object that is already exported
    #[error("object already exported: {0}")]
    AlreadyExported(String),

    /// Listening endpoint could not be created
    #[error("export failed on port {port} (retryable: {retryable}): {source}")]
    ExportFailed {
        port: u16,
        retryable: bool,
        #[source]
        source: std::io::Error,
    },

    /// No proxy can be built for the implementation
    #[error("stub unavailable: {0}")]
    StubNotFound(String),

    /// Reference tag with no known implementation
    #[error("reference class not found: {0}")]
    UnresolvableRef(String),

    /// Client socket factory descriptor with no known factory
    #[error("socket factory not found: {0}")]
    UnknownSocketFactory(String),

    /// Marshalling a remote object that has no reference
    #[error("invalid remote object: {0}")]
    InvalidRemoteObject(String),

    /// Caller misuse
    #[error("illegal argument: {0}")]
    Usage(String),

    /// Object in a state that cannot serve the request
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Failure raised by the remote method and declared by it
    #[error("remote fault: {0}")]
    Application(Fault),

    /// Checked failure raised by the remote method but not declared by it
    #[error("unexpected remote fault: {0}")]
    UnexpectedFault(#[source] Box<Fault>),

    /// Server-side failure outside the remote method
    #[error("server error: {0}")]
    Server(String),

    /// Buffer underflow (not enough data)
    #[error("buffer underflow: need {needed} bytes, have {have}")]
    BufferUnderflow { needed: usize, have: usize },

    /// Invalid data
    #[error("invalid data: {0}")]
    InvalidData(String),
}

impl RemoteError {
    /// Whether the caller may retry the operation that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::ExportFailed { retryable: true, .. })
    }

    /// The application fault carried by this error, if any
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            RemoteError::Application(fault) => Some(fault),
            RemoteError::UnexpectedFault(fault) => Some(fault),
            _ => None,
        }
    }
}
