//! Network descriptors shared by the parser and generator configs.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Describes one CX network in a stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkDescription {
    /// Identifies the network within a multi-network stream. Unique per
    /// config.
    pub label: String,
    /// A short description of what the network represents.
    pub description: String,
    /// The aspects required from (or promised to) this network. Never
    /// empty.
    pub aspects: Vec<String>,
}

/// Shallow validation shared by parser and generator configs: at least
/// one network, labels present and unique, aspect lists non-empty.
pub(crate) fn validate_descriptions(
    role: &str,
    networks: &[NetworkDescription],
) -> Result<(), CodecError> {
    if networks.is_empty() {
        return Err(CodecError::InvalidConfig {
            reason: format!("must have at least one {role} network"),
        });
    }
    let mut used = std::collections::HashSet::new();
    for (position, network) in networks.iter().enumerate() {
        if network.label.is_empty() {
            return Err(CodecError::InvalidConfig {
                reason: format!("{role} network at position {position}: label missing"),
            });
        }
        if !used.insert(network.label.as_str()) {
            return Err(CodecError::InvalidConfig {
                reason: format!(
                    "{role} network at position {position}: duplicate label found: {}",
                    network.label
                ),
            });
        }
        if network.aspects.is_empty() {
            return Err(CodecError::InvalidConfig {
                reason: format!(
                    "{role} network {} at position {position}: aspect list must not be empty",
                    network.label
                ),
            });
        }
        tracing::debug!(
            role,
            label = %network.label,
            aspects = ?network.aspects,
            "valid network description"
        );
    }
    Ok(())
}
