pub mod credentials;
pub mod realtime;
pub mod transport;

// Re-export commonly used types for convenience
pub use credentials::{
    ApiKeySigner, CredentialCache, CredentialError, CredentialScope, RealtimeCredential,
    RequestSigner,
};

pub use realtime::{
    CloseEvent, OpenEvent, RealtimeError, RealtimeListener, RealtimeParameters,
    RealtimeSpeechClient, SessionState,
};

pub use transport::{Transport, TransportConnector, TransportError, TransportEvent};
