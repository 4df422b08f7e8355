//! Static participation gate

/// Whether a peer takes part in the protocol at all. Fixed at construction.
///
/// A faulty peer answers every call but never mutates protocol state and
/// never broadcasts, so from the network it looks like a silent process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultGate {
    faulty: bool,
}

/// Health signal reported by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Live,
    Faulty,
}

impl FaultGate {
    pub fn new(faulty: bool) -> Self {
        FaultGate { faulty }
    }

    pub fn honest() -> Self {
        Self::new(false)
    }

    pub fn is_faulty(&self) -> bool {
        self.faulty
    }

    pub fn participates(&self) -> bool {
        !self.faulty
    }

    pub fn health(&self) -> Health {
        if self.faulty {
            Health::Faulty
        } else {
            Health::Live
        }
    }
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Live => "live",
            Health::Faulty => "faulty",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_health() {
        assert_eq!(FaultGate::honest().health(), Health::Live);
        assert!(FaultGate::honest().participates());

        let gate = FaultGate::new(true);
        assert!(gate.is_faulty());
        assert!(!gate.participates());
        assert_eq!(gate.health().as_str(), "faulty");
    }
}
