// Connectivity diagnosis
//
// Compares the local and external query results. Purely informational: the
// roster only ever follows the external endpoint.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnosis {
    /// Reachable from outside
    FullyUp,
    /// Running, but not reachable from outside
    LocalOnly,
    /// Neither endpoint answers
    FullyDown,
    /// Reachable from outside while the local endpoint fails
    ExternalOnly,
}

/// `local` is `None` when no local endpoint is configured
pub fn diagnose(local: Option<bool>, external: bool) -> Diagnosis {
    match (local, external) {
        (Some(false), true) => Diagnosis::ExternalOnly,
        (_, true) => Diagnosis::FullyUp,
        (Some(true), false) => Diagnosis::LocalOnly,
        (_, false) => Diagnosis::FullyDown,
    }
}

impl Diagnosis {
    /// Log the diagnosis at a level matching its severity
    pub fn log(&self) {
        match self {
            Diagnosis::FullyUp => {
                tracing::info!("DIAGNOSIS: {}", self);
            }
            Diagnosis::LocalOnly => {
                tracing::warn!("DIAGNOSIS: {}", self);
                tracing::warn!(
                    "Possible causes: port forwarding not configured, firewall blocking, DNS not updated"
                );
            }
            Diagnosis::FullyDown => {
                tracing::info!("DIAGNOSIS: {}", self);
            }
            Diagnosis::ExternalOnly => {
                tracing::warn!("DIAGNOSIS: {}", self);
            }
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Diagnosis::FullyUp => "Everything working - server externally accessible",
            Diagnosis::LocalOnly => "Server runs locally but is not externally accessible",
            Diagnosis::FullyDown => "Server appears to be completely offline",
            Diagnosis::ExternalOnly => {
                "Server reachable externally but the local endpoint fails (check local_address)"
            }
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnosis_table() {
        assert_eq!(diagnose(Some(true), true), Diagnosis::FullyUp);
        assert_eq!(diagnose(Some(true), false), Diagnosis::LocalOnly);
        assert_eq!(diagnose(Some(false), false), Diagnosis::FullyDown);
        assert_eq!(diagnose(Some(false), true), Diagnosis::ExternalOnly);
    }

    #[test]
    fn test_without_local_endpoint() {
        assert_eq!(diagnose(None, true), Diagnosis::FullyUp);
        assert_eq!(diagnose(None, false), Diagnosis::FullyDown);
    }
}
