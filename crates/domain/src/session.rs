use crate::certificate::CertificateStatus;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }

    /// Whether `self -> next` is a legal transition. `stop()` may move any
    /// state to `Disconnected`.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Error)
                | (Connected, Error)
                | (_, Disconnected)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notifications published to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        state: SessionState,
        /// Set for `Error` transitions.
        message: Option<String>,
    },
    CertificateStatus {
        hostname: String,
        status: CertificateStatus,
    },
}

impl SessionEvent {
    pub fn state(state: SessionState) -> Self {
        Self::StateChanged {
            state,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::StateChanged {
            state: SessionState::Error,
            message: Some(message.into()),
        }
    }

    pub fn certificate(hostname: impl Into<String>, status: CertificateStatus) -> Self {
        Self::CertificateStatus {
            hostname: hostname.into(),
            status,
        }
    }
}
