//! Model artifact persistence
//!
//! An artifact is a single bincode-encoded envelope:
//! - magic bytes and format version
//! - the feature schema version the encoder was built with
//! - optional cross-validated metrics and a creation timestamp
//! - a SHA256 checksum of the payload
//! - the payload: the bincode-encoded [`TrainedModel`]
//!
//! Writes go to a uniquely named temp file beside the target that is synced
//! and renamed over it, so a reader only ever sees a complete artifact even
//! when two writers race.

use crate::encoder::FEATURE_SCHEMA_VERSION;
use crate::error::{ModelLoadError, PersistError};
use crate::models::AggregateMetrics;
use crate::trainer::TrainedModel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Leading bytes of every artifact
pub const ARTIFACT_MAGIC: [u8; 4] = *b"HPMA";

/// Envelope layout version
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ArtifactEnvelope {
    magic: [u8; 4],
    format_version: u32,
    feature_schema_version: u32,
    created_at: DateTime<Utc>,
    model_version: String,
    metrics: Option<AggregateMetrics>,
    checksum: String,
    payload: Vec<u8>,
}

/// Metadata readable without decoding the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub format_version: u32,
    pub feature_schema_version: u32,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
    pub checksum: String,
    pub metrics: Option<AggregateMetrics>,
}

/// Saves and loads model artifacts
#[derive(Debug, Clone, Default)]
pub struct ModelPersister;

impl ModelPersister {
    pub fn new() -> Self {
        Self
    }

    /// Write `model` to `path` atomically, returning the artifact size
    pub fn save(
        &self,
        model: &TrainedModel,
        metrics: Option<&AggregateMetrics>,
        path: &Path,
    ) -> Result<u64, PersistError> {
        let payload =
            bincode::serialize(model).map_err(|e| PersistError::Serialize(e.to_string()))?;
        let envelope = ArtifactEnvelope {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_schema_version: FEATURE_SCHEMA_VERSION,
            created_at: Utc::now(),
            model_version: model.version().to_string(),
            metrics: metrics.copied(),
            checksum: compute_checksum(&payload),
            payload,
        };
        let bytes =
            bincode::serialize(&envelope).map_err(|e| PersistError::Serialize(e.to_string()))?;

        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| PersistError::Io { path, source }
        };

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(io_err(parent))?;

        // Each writer gets its own temp file in the target directory
        let mut temp = NamedTempFile::new_in(parent).map_err(io_err(parent))?;
        temp.write_all(&bytes).map_err(io_err(temp.path()))?;
        temp.as_file().sync_all().map_err(io_err(temp.path()))?;
        temp.persist(path).map_err(|e| PersistError::Io {
            path: path.to_path_buf(),
            source: e.error,
        })?;

        info!(
            path = %path.display(),
            size = bytes.len(),
            checksum = %envelope.checksum,
            model_version = %envelope.model_version,
            "Model artifact written"
        );
        Ok(bytes.len() as u64)
    }

    /// Read and verify an artifact
    pub fn load(&self, path: &Path) -> Result<TrainedModel, ModelLoadError> {
        let (envelope, _) = read_envelope(path)?;
        let computed = compute_checksum(&envelope.payload);
        if computed != envelope.checksum {
            return Err(ModelLoadError::ChecksumMismatch {
                recorded: envelope.checksum,
                computed,
            });
        }

        let model: TrainedModel = bincode::deserialize(&envelope.payload)
            .map_err(|e| ModelLoadError::Corrupt(format!("payload: {}", e)))?;
        if !model.is_consistent() {
            return Err(ModelLoadError::Corrupt(
                "encoder and ensemble disagree on feature layout".to_string(),
            ));
        }

        debug!(
            path = %path.display(),
            model_version = %model.version(),
            "Model artifact loaded"
        );
        Ok(model)
    }

    /// Read artifact metadata without decoding the model payload
    pub fn inspect(&self, path: &Path) -> Result<ArtifactInfo, ModelLoadError> {
        let (envelope, size_bytes) = read_envelope(path)?;
        Ok(ArtifactInfo {
            path: path.to_path_buf(),
            size_bytes,
            format_version: envelope.format_version,
            feature_schema_version: envelope.feature_schema_version,
            model_version: envelope.model_version,
            created_at: envelope.created_at,
            checksum: envelope.checksum,
            metrics: envelope.metrics,
        })
    }
}

fn read_envelope(path: &Path) -> Result<(ArtifactEnvelope, u64), ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::NotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.len() < ARTIFACT_MAGIC.len() || bytes[..ARTIFACT_MAGIC.len()] != ARTIFACT_MAGIC {
        return Err(ModelLoadError::BadMagic);
    }

    let envelope: ArtifactEnvelope = bincode::deserialize(&bytes)
        .map_err(|e| ModelLoadError::Corrupt(format!("envelope: {}", e)))?;
    if envelope.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(ModelLoadError::UnsupportedFormat {
            found: envelope.format_version,
            expected: ARTIFACT_FORMAT_VERSION,
        });
    }
    if envelope.feature_schema_version != FEATURE_SCHEMA_VERSION {
        return Err(ModelLoadError::SchemaIncompatible {
            found: envelope.feature_schema_version,
            expected: FEATURE_SCHEMA_VERSION,
        });
    }
    Ok((envelope, bytes.len() as u64))
}

/// Compute SHA256 checksum of data
pub(crate) fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainingConfig;
    use crate::models::HousingRecord;
    use crate::trainer::{EncodedDataset, ModelTrainer};
    use tempfile::TempDir;

    fn records() -> Vec<HousingRecord> {
        (0..40)
            .map(|i| HousingRecord {
                ocean_proximity: ["INLAND", "NEAR_BAY", "<1H_OCEAN"][i % 3].to_string(),
                longitude: -118.0 - (i % 6) as f64 * 0.5,
                latitude: 34.0 + (i % 5) as f64 * 0.3,
                housing_median_age: (5 + i) as f64,
                total_rooms: 800.0 + 10.0 * i as f64,
                total_bedrooms: 150.0 + i as f64,
                population: 400.0 + 3.0 * i as f64,
                households: 120.0 + i as f64,
                median_income: 2.0 + (i % 8) as f64 * 0.7,
                median_house_value: 80_000.0 + 30_000.0 * (i % 8) as f64,
            })
            .collect()
    }

    fn trained() -> (TrainedModel, Vec<HousingRecord>) {
        let config = TrainingConfig {
            iterations: 10,
            min_samples_leaf: 2,
            ..Default::default()
        };
        let data = records();
        let dataset = EncodedDataset::from_records(&data, &config).unwrap();
        (ModelTrainer::new(config).fit_dataset(&dataset).unwrap(), data)
    }

    #[test]
    fn test_save_load_round_trip_predictions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("model.bin");
        let (model, data) = trained();
        let persister = ModelPersister::new();

        let size = persister.save(&model, None, &path).unwrap();
        assert_eq!(size, fs::metadata(&path).unwrap().len());
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);

        let loaded = persister.load(&path).unwrap();
        assert_eq!(loaded, model);
        for r in &data {
            assert_eq!(loaded.predict(r).unwrap(), model.predict(r).unwrap());
        }
    }

    #[test]
    fn test_missing_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let err = ModelPersister::new()
            .load(&temp_dir.path().join("absent.bin"))
            .unwrap_err();
        assert!(matches!(err, ModelLoadError::NotFound(_)));
    }

    #[test]
    fn test_truncated_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.bin");
        let (model, _) = trained();
        let persister = ModelPersister::new();
        persister.save(&model, None, &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();
        let err = persister.load(&path).unwrap_err();
        assert!(matches!(err, ModelLoadError::Corrupt(_)), "{:?}", err);
    }

    #[test]
    fn test_bad_magic() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.bin");
        fs::write(&path, b"not a model").unwrap();
        let err = ModelPersister::new().load(&path).unwrap_err();
        assert!(matches!(err, ModelLoadError::BadMagic));
    }

    #[test]
    fn test_tampered_payload_fails_checksum() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.bin");
        let (model, _) = trained();
        let persister = ModelPersister::new();
        persister.save(&model, None, &path).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        let err = persister.load(&path).unwrap_err();
        assert!(matches!(err, ModelLoadError::ChecksumMismatch { .. }), "{:?}", err);
    }

    #[test]
    fn test_incompatible_schema_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.bin");
        let (model, _) = trained();
        let payload = bincode::serialize(&model).unwrap();
        let envelope = ArtifactEnvelope {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            feature_schema_version: FEATURE_SCHEMA_VERSION + 1,
            created_at: Utc::now(),
            model_version: model.version().to_string(),
            metrics: None,
            checksum: compute_checksum(&payload),
            payload,
        };
        fs::write(&path, bincode::serialize(&envelope).unwrap()).unwrap();

        let err = ModelPersister::new().load(&path).unwrap_err();
        assert!(matches!(err, ModelLoadError::SchemaIncompatible { .. }));
    }

    #[test]
    fn test_inspect_reports_metrics() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.bin");
        let (model, _) = trained();
        let metrics = AggregateMetrics {
            r_squared: 0.81,
            ..Default::default()
        };
        let persister = ModelPersister::new();
        persister.save(&model, Some(&metrics), &path).unwrap();

        let info = persister.inspect(&path).unwrap();
        assert_eq!(info.model_version, model.version());
        assert_eq!(info.metrics, Some(metrics));
        assert_eq!(info.checksum.len(), 64);
        assert_eq!(info.feature_schema_version, FEATURE_SCHEMA_VERSION);
    }

    #[test]
    fn test_cyclic_tree_with_valid_checksum_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.bin");
        let (model, _) = trained();

        let mut value = serde_json::to_value(&model).unwrap();
        value["regressor"]["trees"][0]["nodes"][0] = serde_json::json!({
            "Split": { "feature": 0, "threshold": 0.0, "left": 0, "right": 0 }
        });
        let crafted: TrainedModel = serde_json::from_value(value).unwrap();
        let persister = ModelPersister::new();
        persister.save(&crafted, None, &path).unwrap();

        assert!(matches!(
            persister.load(&path),
            Err(ModelLoadError::Corrupt(_))
        ));
    }

    #[test]
    fn test_save_overwrites_wholesale() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.bin");
        fs::write(&path, b"previous artifact contents that are longer").unwrap();
        let (model, _) = trained();
        let persister = ModelPersister::new();
        persister.save(&model, None, &path).unwrap();
        assert_eq!(persister.load(&path).unwrap(), model);
    }

    #[test]
    fn test_racing_saves_publish_a_complete_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.bin");
        let (model, _) = trained();
        let persister = ModelPersister::new();

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for _ in 0..5 {
                        persister.save(&model, None, &path).unwrap();
                    }
                });
            }
        });

        assert_eq!(persister.load(&path).unwrap(), model);
        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("model.bin")]);
    }

    #[test]
    fn test_checksum_consistency() {
        let data = b"test model weights";
        assert_eq!(compute_checksum(data), compute_checksum(data));
        assert_eq!(compute_checksum(data).len(), 64);
    }
}
