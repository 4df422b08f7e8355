//! Error types

use std::fmt;

/// Invalid peer or network configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    NoPeers,
    TooManyFaults { max_faulty: usize, total_nodes: usize },
    UnknownPeer { node_id: usize, total_nodes: usize },
    NonBinaryInitialValue(usize),
    InitialValueCount { expected: usize, found: usize },
    InvalidVariable { name: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoPeers => write!(f, "network needs at least one peer"),
            ConfigError::TooManyFaults {
                max_faulty,
                total_nodes,
            } => write!(
                f,
                "fault tolerance {} must be below peer count {}",
                max_faulty, total_nodes
            ),
            ConfigError::UnknownPeer {
                node_id,
                total_nodes,
            } => write!(f, "peer {} outside [0, {})", node_id, total_nodes),
            ConfigError::NonBinaryInitialValue(node_id) => {
                write!(f, "initial value of peer {} must be 0 or 1", node_id)
            }
            ConfigError::InitialValueCount { expected, found } => write!(
                f,
                "expected {} initial values, found {}",
                expected, found
            ),
            ConfigError::InvalidVariable { name, reason } => {
                write!(f, "invalid {}: {}", name, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Failure talking to another peer
#[derive(Debug)]
pub enum TransportError {
    Request(reqwest::Error),
    Status(reqwest::StatusCode),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Request(e) => write!(f, "request error: {}", e),
            TransportError::Status(status) => write!(f, "HTTP error: {}", status),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Request(e) => Some(e),
            TransportError::Status(_) => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(err)
    }
}

/// Inbound message rejected at the peer boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation error in {}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// Failure bringing up or driving a local network of peers
#[derive(Debug)]
pub enum NetworkError {
    Config(ConfigError),
    Io(std::io::Error),
    Transport(TransportError),
    Timeout(std::time::Duration),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Config(e) => write!(f, "configuration error: {}", e),
            NetworkError::Io(e) => write!(f, "I/O error: {}", e),
            NetworkError::Transport(e) => write!(f, "transport error: {}", e),
            NetworkError::Timeout(after) => write!(f, "no decision after {:?}", after),
        }
    }
}

impl std::error::Error for NetworkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetworkError::Config(e) => Some(e),
            NetworkError::Io(e) => Some(e),
            NetworkError::Transport(e) => Some(e),
            NetworkError::Timeout(_) => None,
        }
    }
}

impl From<ConfigError> for NetworkError {
    fn from(err: ConfigError) -> Self {
        NetworkError::Config(err)
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::Io(err)
    }
}

impl From<TransportError> for NetworkError {
    fn from(err: TransportError) -> Self {
        NetworkError::Transport(err)
    }
}
