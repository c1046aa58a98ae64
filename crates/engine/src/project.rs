use std::collections::HashSet;
use std::path::{Path, PathBuf};

use media_session::MediaSource;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::timeline::{MediaId, Sequence};

/// Media resource referenced by clips of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub media_id: MediaId,
    pub path: PathBuf,
    pub duration_ms: f64,
    pub frame_rate: f64,
}

impl From<MediaAsset> for MediaSource {
    fn from(value: MediaAsset) -> Self {
        Self {
            media_id: value.media_id,
            path: value.path,
            duration_ms: value.duration_ms,
            frame_rate: value.frame_rate,
        }
    }
}

/// A sequence together with the media its clips reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub sequence: Sequence,
    #[serde(default)]
    pub media: Vec<MediaAsset>,
}

impl Project {
    /// Validates the sequence and the media list, and checks every clip
    /// references known media.
    pub fn validate(&self) -> Result<()> {
        self.sequence.validate()?;
        if let Some(asset) = self
            .media
            .iter()
            .find(|asset| !asset.frame_rate.is_finite() || asset.frame_rate <= 0.0)
        {
            return Err(EngineError::InvalidMediaRate {
                media_id: asset.media_id.clone(),
                frame_rate: asset.frame_rate,
            });
        }

        let known: HashSet<&str> = self
            .media
            .iter()
            .map(|asset| asset.media_id.as_str())
            .collect();
        let unknown = self
            .sequence
            .tracks
            .iter()
            .flat_map(|track| track.clips.iter())
            .filter_map(|clip| clip.media_id.as_deref())
            .find(|media_id| !known.contains(media_id));
        match unknown {
            Some(media_id) => Err(EngineError::UnknownMedia {
                media_id: media_id.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Reads and validates a project JSON file.
pub fn load_project(path: &Path) -> Result<Project> {
    let json = std::fs::read_to_string(path).map_err(|source| EngineError::SequenceIo {
        context: "failed to read project file",
        path: path.to_path_buf(),
        source,
    })?;
    let project: Project =
        serde_json::from_str(&json).map_err(|source| EngineError::SequenceSerialization {
            path: path.to_path_buf(),
            source,
        })?;
    project.validate()?;
    Ok(project)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{Project, load_project};
    use crate::error::EngineError;

    const PROJECT_JSON: &str = r#"{
        "sequence": {
            "fps": 30,
            "tracks": [{
                "id": "v1",
                "clips": [{
                    "id": "a",
                    "trackId": "v1",
                    "mediaId": "intro",
                    "startFrame": 0,
                    "sourceInFrame": 0,
                    "sourceOutFrame": 90
                }]
            }]
        },
        "media": [{
            "mediaId": "intro",
            "path": "intro.mp4",
            "durationMs": 3000,
            "frameRate": 30
        }]
    }"#;

    #[test]
    fn load_project_reads_sequence_and_media() {
        let path = temp_path("valid");
        std::fs::write(&path, PROJECT_JSON).expect("write project");
        let project = load_project(&path);
        let _ = std::fs::remove_file(&path);

        let project = project.expect("project should load");
        assert_eq!(project.sequence.fps, 30.0);
        assert_eq!(project.media[0].duration_ms, 3_000.0);
    }

    #[test]
    fn clips_must_reference_registered_media() {
        let mut project: Project = serde_json::from_str(PROJECT_JSON).expect("parse");
        project.media.clear();

        assert!(matches!(
            project.validate(),
            Err(EngineError::UnknownMedia { media_id }) if media_id == "intro"
        ));
    }

    #[test]
    fn media_frame_rate_must_be_positive() {
        let json = PROJECT_JSON.replace(r#""frameRate": 30"#, r#""frameRate": -25"#);
        let path = temp_path("negative-rate");
        std::fs::write(&path, json).expect("write project");
        let result = load_project(&path);
        let _ = std::fs::remove_file(&path);

        assert!(matches!(
            result,
            Err(EngineError::InvalidMediaRate { media_id, frame_rate })
                if media_id == "intro" && frame_rate == -25.0
        ));
    }

    #[test]
    fn load_project_reports_io_and_parse_failures() {
        assert!(matches!(
            load_project(&PathBuf::from("/nonexistent/project.json")),
            Err(EngineError::SequenceIo { .. })
        ));

        let path = temp_path("malformed");
        std::fs::write(&path, "[1, 2").expect("write project");
        let result = load_project(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(
            result,
            Err(EngineError::SequenceSerialization { .. })
        ));
    }

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("project-{}-{label}.json", std::process::id()))
    }
}
