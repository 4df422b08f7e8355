//! Peer and network configuration

use crate::consensus::Value;
use crate::error::ConfigError;
use std::env;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_BASE_PORT: u16 = 3000;
pub const DEFAULT_STARTING_ROUND: u64 = 1;

/// What `stop` leaves behind in the peer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopPolicy {
    /// Value, decision and round go back to the "not running" sentinel.
    #[default]
    Reset,
    /// The last value, decision and round stay observable.
    KeepDecision,
}

impl std::str::FromStr for StopPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(StopPolicy::Reset),
            "keep" | "keep-decision" | "keep_decision" => Ok(StopPolicy::KeepDecision),
            other => Err(ConfigError::InvalidVariable {
                name: "stop policy".to_string(),
                reason: format!("unknown policy {:?}", other),
            }),
        }
    }
}

/// Everything one peer needs to know about itself and the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    pub node_id: usize,
    /// N
    pub total_nodes: usize,
    /// F
    pub max_faulty: usize,
    pub initial_value: Value,
    pub is_faulty: bool,
    pub starting_round: u64,
    pub stop_policy: StopPolicy,
}

impl PeerConfig {
    pub fn new(node_id: usize, total_nodes: usize, max_faulty: usize, initial_value: Value) -> Self {
        PeerConfig {
            node_id,
            total_nodes,
            max_faulty,
            initial_value,
            is_faulty: false,
            starting_round: DEFAULT_STARTING_ROUND,
            stop_policy: StopPolicy::default(),
        }
    }

    pub fn faulty(mut self, is_faulty: bool) -> Self {
        self.is_faulty = is_faulty;
        self
    }

    pub fn with_starting_round(mut self, round: u64) -> Self {
        self.starting_round = round;
        self
    }

    pub fn with_stop_policy(mut self, policy: StopPolicy) -> Self {
        self.stop_policy = policy;
        self
    }

    /// Distinct senders needed before acting on a round/phase: `N - F`,
    /// never below one for configs that skipped [`validate`](Self::validate).
    pub fn quorum(&self) -> usize {
        self.total_nodes.saturating_sub(self.max_faulty).max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_nodes == 0 {
            return Err(ConfigError::NoPeers);
        }
        if self.max_faulty >= self.total_nodes {
            return Err(ConfigError::TooManyFaults {
                max_faulty: self.max_faulty,
                total_nodes: self.total_nodes,
            });
        }
        if self.node_id >= self.total_nodes {
            return Err(ConfigError::UnknownPeer {
                node_id: self.node_id,
                total_nodes: self.total_nodes,
            });
        }
        if !self.initial_value.is_concrete() {
            return Err(ConfigError::NonBinaryInitialValue(self.node_id));
        }
        Ok(())
    }
}

/// Maps a peer index to the base URL it is reachable at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBook {
    urls: Vec<String>,
}

impl AddressBook {
    pub fn new(urls: Vec<String>) -> Self {
        AddressBook { urls }
    }

    /// Peers on one host at `base_port + index`
    pub fn local(host: &str, base_port: u16, total_nodes: usize) -> Self {
        let urls = (0..total_nodes)
            .map(|i| format!("http://{}:{}", host, base_port as usize + i))
            .collect();
        AddressBook { urls }
    }

    pub fn url(&self, node_id: usize) -> Option<&str> {
        self.urls.get(node_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.urls.iter().enumerate().map(|(i, url)| (i, url.as_str()))
    }
}

/// Settings for a whole local network of peers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub host: String,
    pub base_port: u16,
    pub total_nodes: usize,
    pub max_faulty: usize,
    pub initial_values: Vec<Value>,
    pub faulty_peers: Vec<usize>,
    pub starting_round: u64,
    pub stop_policy: StopPolicy,
    pub readiness_poll: Duration,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self::new(4, 1)
    }
}

impl NetworkSettings {
    /// All peers honest, all starting from 1.
    pub fn new(total_nodes: usize, max_faulty: usize) -> Self {
        NetworkSettings {
            host: DEFAULT_HOST.to_string(),
            base_port: DEFAULT_BASE_PORT,
            total_nodes,
            max_faulty,
            initial_values: vec![Value::One; total_nodes],
            faulty_peers: Vec::new(),
            starting_round: DEFAULT_STARTING_ROUND,
            stop_policy: StopPolicy::default(),
            readiness_poll: Duration::from_millis(100),
        }
    }

    pub fn with_base_port(mut self, port: u16) -> Self {
        self.base_port = port;
        self
    }

    pub fn with_initial_values(mut self, values: Vec<Value>) -> Self {
        self.initial_values = values;
        self
    }

    pub fn with_faulty_peers(mut self, peers: Vec<usize>) -> Self {
        self.faulty_peers = peers;
        self
    }

    /// Loads `.env` and reads `BEN_OR_*` variables from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds settings from any variable source. Missing variables keep
    /// their defaults.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let total_nodes = match lookup("BEN_OR_NODES") {
            Some(raw) => parse_number("BEN_OR_NODES", &raw)?,
            None => 4,
        };
        let max_faulty = match lookup("BEN_OR_MAX_FAULTY") {
            Some(raw) => parse_number("BEN_OR_MAX_FAULTY", &raw)?,
            None => 1,
        };
        let mut settings = NetworkSettings::new(total_nodes, max_faulty);

        if let Some(host) = lookup("BEN_OR_HOST") {
            settings.host = host;
        }
        if let Some(raw) = lookup("BEN_OR_BASE_PORT") {
            settings.base_port = parse_number("BEN_OR_BASE_PORT", &raw)?;
        }
        if let Some(raw) = lookup("BEN_OR_INITIAL_VALUES") {
            settings.initial_values = parse_values(&raw)?;
        }
        if let Some(raw) = lookup("BEN_OR_FAULTY_PEERS") {
            settings.faulty_peers = parse_list("BEN_OR_FAULTY_PEERS", &raw)?;
        }
        if let Some(raw) = lookup("BEN_OR_STARTING_ROUND") {
            settings.starting_round = parse_number("BEN_OR_STARTING_ROUND", &raw)?;
        }
        if let Some(raw) = lookup("BEN_OR_STOP_POLICY") {
            settings.stop_policy = raw.parse()?;
        }
        if let Some(raw) = lookup("BEN_OR_READINESS_POLL_MS") {
            let ms: u64 = parse_number("BEN_OR_READINESS_POLL_MS", &raw)?;
            settings.readiness_poll = Duration::from_millis(ms);
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_values.len() != self.total_nodes {
            return Err(ConfigError::InitialValueCount {
                expected: self.total_nodes,
                found: self.initial_values.len(),
            });
        }
        if let Some(&node_id) = self.faulty_peers.iter().find(|&&i| i >= self.total_nodes) {
            return Err(ConfigError::UnknownPeer {
                node_id,
                total_nodes: self.total_nodes,
            });
        }
        if self.base_port as usize + self.total_nodes > u16::MAX as usize + 1 {
            return Err(ConfigError::InvalidVariable {
                name: "BEN_OR_BASE_PORT".to_string(),
                reason: format!("{} peers do not fit above port {}", self.total_nodes, self.base_port),
            });
        }
        self.peer_configs().iter().try_for_each(PeerConfig::validate)
    }

    pub fn peer_configs(&self) -> Vec<PeerConfig> {
        (0..self.total_nodes)
            .map(|i| {
                let initial_value = self.initial_values.get(i).copied().unwrap_or(Value::One);
                PeerConfig::new(i, self.total_nodes, self.max_faulty, initial_value)
                    .faulty(self.faulty_peers.contains(&i))
                    .with_starting_round(self.starting_round)
                    .with_stop_policy(self.stop_policy)
            })
            .collect()
    }

    pub fn address_book(&self) -> AddressBook {
        AddressBook::local(&self.host, self.base_port, self.total_nodes)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVariable {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn parse_list(name: &str, raw: &str) -> Result<Vec<usize>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_number(name, s))
        .collect()
}

fn parse_values(raw: &str) -> Result<Vec<Value>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s {
            "0" => Ok(Value::Zero),
            "1" => Ok(Value::One),
            other => Err(ConfigError::InvalidVariable {
                name: "BEN_OR_INITIAL_VALUES".to_string(),
                reason: format!("{:?} is not 0 or 1", other),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_quorum_size() {
        let config = PeerConfig::new(0, 4, 1, Value::One);
        assert_eq!(config.quorum(), 3);
        assert_eq!(PeerConfig::new(0, 10, 3, Value::One).quorum(), 7);
        assert_eq!(PeerConfig::new(0, 2, 5, Value::One).quorum(), 1);
        assert_eq!(PeerConfig::new(0, 3, 3, Value::One).quorum(), 1);
    }

    #[test]
    fn test_peer_config_validation() {
        assert!(PeerConfig::new(0, 4, 1, Value::One).validate().is_ok());
        assert_eq!(
            PeerConfig::new(0, 0, 0, Value::One).validate(),
            Err(ConfigError::NoPeers)
        );
        assert!(matches!(
            PeerConfig::new(0, 3, 3, Value::One).validate(),
            Err(ConfigError::TooManyFaults { .. })
        ));
        assert!(matches!(
            PeerConfig::new(4, 4, 1, Value::One).validate(),
            Err(ConfigError::UnknownPeer { .. })
        ));
        assert_eq!(
            PeerConfig::new(2, 4, 1, Value::Unknown).validate(),
            Err(ConfigError::NonBinaryInitialValue(2))
        );
    }

    #[test]
    fn test_address_book_local() {
        let book = AddressBook::local("127.0.0.1", 3000, 3);
        assert_eq!(book.len(), 3);
        assert_eq!(book.url(0), Some("http://127.0.0.1:3000"));
        assert_eq!(book.url(2), Some("http://127.0.0.1:3002"));
        assert_eq!(book.url(3), None);
    }

    #[test]
    fn test_settings_defaults() {
        let settings = NetworkSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, NetworkSettings::default());
        assert_eq!(settings.base_port, 3000);
        assert_eq!(settings.initial_values, vec![Value::One; 4]);
    }

    #[test]
    fn test_settings_from_lookup() {
        let settings = NetworkSettings::from_lookup(lookup(&[
            ("BEN_OR_NODES", "5"),
            ("BEN_OR_MAX_FAULTY", "2"),
            ("BEN_OR_BASE_PORT", "4100"),
            ("BEN_OR_INITIAL_VALUES", "0, 1, 1, 0, 1"),
            ("BEN_OR_FAULTY_PEERS", "1,4"),
            ("BEN_OR_STARTING_ROUND", "0"),
            ("BEN_OR_STOP_POLICY", "keep"),
        ]))
        .unwrap();

        assert_eq!(settings.total_nodes, 5);
        assert_eq!(settings.max_faulty, 2);
        assert_eq!(settings.base_port, 4100);
        assert_eq!(settings.faulty_peers, vec![1, 4]);
        assert_eq!(settings.stop_policy, StopPolicy::KeepDecision);

        let peers = settings.peer_configs();
        assert_eq!(peers.len(), 5);
        assert_eq!(peers[0].initial_value, Value::Zero);
        assert!(peers[1].is_faulty);
        assert!(!peers[2].is_faulty);
        assert_eq!(peers[3].starting_round, 0);
        assert_eq!(settings.address_book().url(4), Some("http://127.0.0.1:4104"));
    }

    #[test]
    fn test_settings_rejects_bad_input() {
        assert!(matches!(
            NetworkSettings::from_lookup(lookup(&[("BEN_OR_NODES", "four")])),
            Err(ConfigError::InvalidVariable { .. })
        ));
        assert!(matches!(
            NetworkSettings::from_lookup(lookup(&[("BEN_OR_INITIAL_VALUES", "1,1,?,1")])),
            Err(ConfigError::InvalidVariable { .. })
        ));
        assert_eq!(
            NetworkSettings::from_lookup(lookup(&[("BEN_OR_INITIAL_VALUES", "1,1")])),
            Err(ConfigError::InitialValueCount {
                expected: 4,
                found: 2
            })
        );
        assert!(matches!(
            NetworkSettings::from_lookup(lookup(&[("BEN_OR_FAULTY_PEERS", "7")])),
            Err(ConfigError::UnknownPeer { node_id: 7, .. })
        ));
    }
}
