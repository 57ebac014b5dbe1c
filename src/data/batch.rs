//! Padded dialogue batches as handed over by the upstream sequence encoder.
//!
//! Layout follows the encoder's time-major convention:
//! - `features`: [seq_len, batch, feature_dim]
//! - speaker masks: [seq_len, batch, num_speakers], one-hot per valid row
//! - `lengths`: [batch], number of valid utterances per dialogue

use std::path::Path;

use burn::prelude::*;
use burn::tensor::Distribution;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Host-side one-hot speaker masks, [seq_len, batch, num_speakers].
///
/// Kept on the host because relation labels are resolved per edge while the
/// graph is assembled.
#[derive(Debug, Clone)]
pub struct SpeakerMasks {
    data: Vec<f32>,
    dims: [usize; 3],
}

impl SpeakerMasks {
    /// Wrap a flat time-major one-hot buffer.
    pub fn from_one_hot(data: Vec<f32>, dims: [usize; 3]) -> Result<Self> {
        let expected = dims[0] * dims[1] * dims[2];
        if data.len() != expected {
            return Err(Error::ShapeMismatch {
                what: "speaker masks",
                expected: format!("{} values for {:?}", expected, dims),
                got: data.len().to_string(),
            });
        }
        Ok(Self { data, dims })
    }

    /// Read a mask tensor back to the host.
    pub fn from_tensor<B: Backend>(masks: Tensor<B, 3>) -> Result<Self> {
        let dims = masks.dims();
        let data = masks
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| Error::TensorData(format!("{:?}", e)))?;
        Self::from_one_hot(data, dims)
    }

    /// One-hot encode per-dialogue speaker indices, padding with zero rows.
    pub fn from_indices(
        speakers: &[Vec<usize>],
        seq_len: usize,
        num_speakers: usize,
    ) -> Result<Self> {
        let batch = speakers.len();
        let mut data = vec![0.0f32; seq_len * batch * num_speakers];
        for (b, dialogue) in speakers.iter().enumerate() {
            if dialogue.len() > seq_len {
                return Err(Error::LengthOutOfRange {
                    dialogue: b,
                    length: dialogue.len(),
                    seq_len,
                });
            }
            for (t, &speaker) in dialogue.iter().enumerate() {
                if speaker >= num_speakers {
                    return Err(Error::UnknownSpeaker {
                        speaker,
                        num_speakers,
                    });
                }
                data[(t * batch + b) * num_speakers + speaker] = 1.0;
            }
        }
        Ok(Self {
            data,
            dims: [seq_len, batch, num_speakers],
        })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Speaker index at `position` of dialogue `dialogue`.
    ///
    /// The first entry equal to 1 wins; a row without one is malformed.
    pub fn speaker(&self, position: usize, dialogue: usize) -> Result<usize> {
        let [_, batch, width] = self.dims;
        let start = (position * batch + dialogue) * width;
        self.data[start..start + width]
            .iter()
            .position(|&v| v == 1.0)
            .ok_or(Error::MissingSpeaker { dialogue, position })
    }
}

/// One padded mini-batch of encoded dialogues.
#[derive(Debug, Clone)]
pub struct DialogueBatch<B: Backend> {
    /// [seq_len, batch, feature_dim]
    pub features: Tensor<B, 3>,
    pub speakers: SpeakerMasks,
    /// Valid utterances per dialogue.
    pub lengths: Vec<usize>,
}

impl<B: Backend> DialogueBatch<B> {
    /// Check the three inputs agree before any graph work starts.
    pub fn new(features: Tensor<B, 3>, speakers: SpeakerMasks, lengths: Vec<usize>) -> Result<Self> {
        let [seq_len, batch, _] = features.dims();
        let [mask_len, mask_batch, _] = speakers.dims();
        if mask_len != seq_len || mask_batch != batch {
            return Err(Error::ShapeMismatch {
                what: "speaker masks",
                expected: format!("[{}, {}, _]", seq_len, batch),
                got: format!("[{}, {}, _]", mask_len, mask_batch),
            });
        }
        if lengths.len() != batch {
            return Err(Error::ShapeMismatch {
                what: "lengths",
                expected: batch.to_string(),
                got: lengths.len().to_string(),
            });
        }
        for (dialogue, &length) in lengths.iter().enumerate() {
            if length > seq_len {
                return Err(Error::LengthOutOfRange {
                    dialogue,
                    length,
                    seq_len,
                });
            }
        }
        Ok(Self {
            features,
            speakers,
            lengths,
        })
    }

    pub fn seq_len(&self) -> usize {
        self.features.dims()[0]
    }

    pub fn batch_size(&self) -> usize {
        self.features.dims()[1]
    }

    pub fn feature_dim(&self) -> usize {
        self.features.dims()[2]
    }

    /// Node count of the batch graph.
    pub fn total_nodes(&self) -> usize {
        self.lengths.iter().sum()
    }

    /// Build a padded batch from per-dialogue records.
    ///
    /// Dialogues without utterances are kept as zero-length entries; the
    /// padded length is at least one timestep.
    pub fn from_file(
        file: &BatchFile,
        feature_dim: usize,
        num_speakers: usize,
        device: &B::Device,
    ) -> Result<Self> {
        let batch = file.dialogues.len();
        if batch == 0 {
            return Err(Error::EmptyBatch);
        }
        let seq_len = file
            .dialogues
            .iter()
            .map(|d| d.features.len())
            .max()
            .unwrap_or(0)
            .max(1);

        let mut data = vec![0.0f32; seq_len * batch * feature_dim];
        let mut lengths = Vec::with_capacity(batch);
        let mut speakers = Vec::with_capacity(batch);
        for (b, dialogue) in file.dialogues.iter().enumerate() {
            if dialogue.speakers.len() != dialogue.features.len() {
                return Err(Error::ShapeMismatch {
                    what: "dialogue speakers",
                    expected: dialogue.features.len().to_string(),
                    got: dialogue.speakers.len().to_string(),
                });
            }
            for (t, utterance) in dialogue.features.iter().enumerate() {
                if utterance.len() != feature_dim {
                    return Err(Error::ShapeMismatch {
                        what: "utterance features",
                        expected: feature_dim.to_string(),
                        got: utterance.len().to_string(),
                    });
                }
                let start = (t * batch + b) * feature_dim;
                data[start..start + feature_dim].copy_from_slice(utterance);
            }
            lengths.push(dialogue.features.len());
            speakers.push(dialogue.speakers.clone());
        }

        let features = Tensor::<B, 3>::from_data(
            TensorData::new(data, [seq_len, batch, feature_dim]),
            device,
        );
        let speakers = SpeakerMasks::from_indices(&speakers, seq_len, num_speakers)?;
        Self::new(features, speakers, lengths)
    }

    /// Random features with speakers taking turns, for smoke runs and benches.
    pub fn synthetic(
        lengths: &[usize],
        feature_dim: usize,
        num_speakers: usize,
        device: &B::Device,
    ) -> Result<Self> {
        if lengths.is_empty() {
            return Err(Error::EmptyBatch);
        }
        let seq_len = lengths.iter().copied().max().unwrap_or(0).max(1);
        let features = Tensor::<B, 3>::random(
            [seq_len, lengths.len(), feature_dim],
            Distribution::Normal(0.0, 1.0),
            device,
        );
        let speakers: Vec<Vec<usize>> = lengths
            .iter()
            .map(|&len| (0..len).map(|t| t % num_speakers.max(1)).collect())
            .collect();
        let speakers = SpeakerMasks::from_indices(&speakers, seq_len, num_speakers)?;
        Self::new(features, speakers, lengths.to_vec())
    }
}

/// JSON batch description: one record per dialogue, unpadded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchFile {
    pub dialogues: Vec<DialogueRecord>,
}

/// Encoded utterances and their speakers for one dialogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialogueRecord {
    pub features: Vec<Vec<f32>>,
    pub speakers: Vec<usize>,
}

impl BatchFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Width of the first utterance, if the file holds any.
    pub fn feature_dim(&self) -> Option<usize> {
        self.dialogues
            .iter()
            .find_map(|d| d.features.first())
            .map(|u| u.len())
    }
}
