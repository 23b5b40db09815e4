use crate::error::{EngineError, EngineResult};
use crate::schema::{self, FILE_IDENTIFIER, SCHEMA_VERSION};
use tracing::debug;

/// A verified, owned TFLite model buffer.
#[derive(Debug, Clone)]
pub struct FlatBufferModel {
    bytes: Vec<u8>,
}

impl FlatBufferModel {
    /// Checks the file identifier, verifies the flatbuffer structure and the schema version.
    pub fn from_bytes(bytes: Vec<u8>) -> EngineResult<Self> {
        // root offset + identifier
        if bytes.len() < 8 || !flatbuffers::buffer_has_identifier(&bytes, FILE_IDENTIFIER, false)
        {
            return Err(EngineError::Identifier {
                expected: FILE_IDENTIFIER,
            });
        }
        let model = flatbuffers::root::<schema::Model>(&bytes)?;
        if model.version() != SCHEMA_VERSION {
            return Err(EngineError::SchemaVersion {
                found: model.version(),
                expected: SCHEMA_VERSION,
            });
        }
        let subgraphs = model.subgraphs().map(|s| s.len()).unwrap_or(0);
        if subgraphs == 0 {
            return Err(EngineError::malformed("model has no subgraph"));
        }
        debug!(
            bytes = bytes.len(),
            subgraphs,
            description = model.description().unwrap_or(""),
            "model loaded"
        );
        Ok(Self { bytes })
    }

    /// Verified root table of the model.
    pub fn model(&self) -> EngineResult<schema::Model<'_>> {
        Ok(flatbuffers::root::<schema::Model>(&self.bytes)?)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn description(&self) -> Option<&str> {
        self.model().ok().and_then(|model| model.description())
    }
}
