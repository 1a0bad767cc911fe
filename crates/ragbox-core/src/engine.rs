use std::fmt;

use serde::{Deserialize, Serialize};

/// Selectable backend query mode. The value determines which retrieval
/// endpoint handles a chat query and is read at dispatch time, never
/// snapshotted earlier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Enhanced,
    Pinecone,
}

impl Engine {
    pub fn as_str(self) -> &'static str {
        match self {
            Engine::Enhanced => "enhanced",
            Engine::Pinecone => "pinecone",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
