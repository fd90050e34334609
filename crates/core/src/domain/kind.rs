// Job kinds: which pipeline owns a job

use super::error::DomainError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "m4a", "ogg", "aac", "wma", "opus", "aiff", "alac",
];
const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "mkv", "mpeg", "avi", "webm"];
const SUMMARY_EXTENSIONS: &[&str] = &["txt", "md", "csv", "rtf", "tsv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Audio,
    Video,
    Summary,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Audio, JobKind::Video, JobKind::Summary];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Audio => "audio",
            JobKind::Video => "video",
            JobKind::Summary => "summary",
        }
    }

    /// Lowercase extensions (without dot) this kind accepts
    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            JobKind::Audio => AUDIO_EXTENSIONS,
            JobKind::Video => VIDEO_EXTENSIONS,
            JobKind::Summary => SUMMARY_EXTENSIONS,
        }
    }

    /// Case-insensitive extension check
    pub fn accepts(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.accepted_extensions().contains(&ext.as_str())
            })
            .unwrap_or(false)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(JobKind::Audio),
            "video" => Ok(JobKind::Video),
            "summary" => Ok(JobKind::Summary),
            other => Err(DomainError::UnknownKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_is_case_insensitive() {
        assert!(JobKind::Audio.accepts("/data/Interview.MP3"));
        assert!(JobKind::Video.accepts("clip.webm"));
        assert!(!JobKind::Video.accepts("clip.mp3"));
    }

    #[test]
    fn test_accepts_rejects_missing_extension() {
        assert!(!JobKind::Summary.accepts("README"));
        assert!(!JobKind::Summary.accepts(""));
    }

    #[test]
    fn test_from_str_roundtrip() {
        for kind in JobKind::ALL {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
        assert!(matches!(
            "podcast".parse::<JobKind>(),
            Err(DomainError::UnknownKind(_))
        ));
    }
}
