//! Error type shared by graph construction, model assembly and the CLI.

use thiserror::Error;

/// Everything that can go wrong between raw dialogue tensors and log-probs.
#[derive(Debug, Error)]
pub enum Error {
    /// Window bound below -1.
    #[error("invalid window bound {0}: expected -1 (unbounded) or a non-negative count")]
    InvalidWindow(i64),

    /// Configuration value out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Tensor or buffer shape disagrees with its companions.
    #[error("shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        got: String,
    },

    /// A dialogue claims more valid utterances than the padded sequence holds.
    #[error("dialogue {dialogue}: valid length {length} exceeds padded length {seq_len}")]
    LengthOutOfRange {
        dialogue: usize,
        length: usize,
        seq_len: usize,
    },

    /// Padded length exceeds the edge scorer's output width.
    #[error("sequence length {seq_len} exceeds max_seq_len {max_seq_len}")]
    SequenceTooLong { seq_len: usize, max_seq_len: usize },

    /// Speaker mask row has no entry set to 1.
    #[error("dialogue {dialogue}, position {position}: speaker mask has no active speaker")]
    MissingSpeaker { dialogue: usize, position: usize },

    /// Speaker index outside the relation map.
    #[error("speaker {speaker} out of range for {num_speakers} speakers")]
    UnknownSpeaker { speaker: usize, num_speakers: usize },

    /// An anchor inside a dialogue has nothing to normalize over.
    #[error("dialogue {dialogue}, anchor {anchor}: empty candidate edge set")]
    EmptyCandidateSet { dialogue: usize, anchor: usize },

    /// Every candidate weight of an anchor underflowed to zero.
    #[error("dialogue {dialogue}, anchor {anchor}: attention mass underflowed to zero")]
    DegenerateAttention { dialogue: usize, anchor: usize },

    /// The batch holds no dialogues at all.
    #[error("batch contains no dialogues")]
    EmptyBatch,

    /// Persisted relation map disagrees with the canonical label ordering.
    #[error("relation map mismatch: {0}")]
    RelationMapMismatch(String),

    /// Tensor data could not be read back to the host.
    #[error("tensor data: {0}")]
    TensorData(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate result alias.
pub type Result<T> = std::result::Result<T, Error>;
