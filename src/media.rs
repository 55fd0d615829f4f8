//! Audio and video extraction: probe, pull the audio track, transcribe.
//!
//! Every request works in its own scratch directory. The directory is owned
//! by the extraction future, so a cancelled request removes its transcription
//! artifacts when the future is dropped.

use crate::engines::{ExtractionEngines, Transcript};
use crate::extract::{Draft, ExtractError};
use std::path::Path;
use tracing::debug;

pub(crate) async fn extract_media(
    path: &Path,
    engines: &ExtractionEngines,
) -> Result<Draft, ExtractError> {
    let info = engines.media.probe(path).await?;

    if info.audio_streams == 0 {
        return Err(ExtractError::UnsupportedMedia(format!(
            "{} has no audio stream",
            path.display()
        )));
    }
    debug!(
        file = %path.display(),
        duration_secs = info.duration_secs,
        video_streams = info.video_streams,
        "probed media"
    );

    let scratch = tempfile::Builder::new()
        .prefix("lucid-")
        .tempdir()
        .map_err(|e| ExtractError::TranscriptionFailed(format!("no scratch directory: {e}")))?;
    let wav = scratch.path().join("audio.wav");

    // Containers and compressed audio are both transcoded to 16 kHz mono PCM.
    engines.media.extract_audio(path, &wav).await?;
    let transcript = engines.transcriber.transcribe(&wav).await?;
    drop(scratch);

    debug!(
        file = %path.display(),
        segments = transcript.segments.len(),
        language = transcript.language.as_deref(),
        "transcription finished"
    );

    Ok(Draft {
        text: format_transcript(&transcript),
        duration_secs: info.duration_secs,
        language: transcript.language,
        transcribed: true,
        ..Draft::default()
    })
}

/// Render segments as `[MM:SS] text` lines, in time order.
pub fn format_transcript(transcript: &Transcript) -> String {
    let mut segments: Vec<_> = transcript.segments.iter().collect();
    segments.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));

    segments
        .iter()
        .map(|segment| format!("{} {}", timestamp(segment.start_secs), segment.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn timestamp(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("[{:02}:{:02}]", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::{MediaInfo, MediaToolkit, Transcriber, TranscriptSegment};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    struct StubToolkit {
        audio_streams: usize,
    }

    #[async_trait]
    impl MediaToolkit for StubToolkit {
        async fn probe(&self, _media: &Path) -> Result<MediaInfo, ExtractError> {
            Ok(MediaInfo {
                duration_secs: Some(2400.0),
                audio_streams: self.audio_streams,
                video_streams: 1,
                format_name: Some("matroska,webm".to_string()),
            })
        }

        async fn extract_audio(&self, _media: &Path, wav_out: &Path) -> Result<(), ExtractError> {
            std::fs::write(wav_out, b"RIFF").map_err(|e| ExtractError::UnsupportedMedia(e.to_string()))
        }
    }

    /// Records the WAV path it was handed so tests can check cleanup.
    struct StubTranscriber {
        seen: Mutex<Option<PathBuf>>,
        fail: bool,
    }

    #[async_trait]
    impl Transcriber for StubTranscriber {
        async fn transcribe(&self, wav: &Path) -> Result<Transcript, ExtractError> {
            *self.seen.lock().unwrap() = Some(wav.to_path_buf());
            if self.fail {
                return Err(ExtractError::TranscriptionFailed("model missing".to_string()));
            }
            Ok(Transcript {
                segments: vec![
                    TranscriptSegment {
                        start_secs: 75.5,
                        end_secs: 80.0,
                        text: "Second point.".to_string(),
                    },
                    TranscriptSegment {
                        start_secs: 0.0,
                        end_secs: 5.0,
                        text: " Welcome everyone.".to_string(),
                    },
                ],
                language: Some("en".to_string()),
            })
        }
    }

    fn engines(audio_streams: usize, transcriber: Arc<StubTranscriber>) -> ExtractionEngines {
        let disabled = ExtractionEngines::disabled();
        ExtractionEngines {
            media: Arc::new(StubToolkit { audio_streams }),
            transcriber,
            ..disabled
        }
    }

    fn transcriber(fail: bool) -> Arc<StubTranscriber> {
        Arc::new(StubTranscriber {
            seen: Mutex::new(None),
            fail,
        })
    }

    #[tokio::test]
    async fn transcript_is_time_ordered_and_stamped() {
        let stub = transcriber(false);
        let draft = extract_media(Path::new("lecture.mkv"), &engines(1, stub.clone()))
            .await
            .unwrap();

        assert_eq!(draft.text, "[00:00] Welcome everyone.\n[01:15] Second point.");
        assert_eq!(draft.duration_secs, Some(2400.0));
        assert_eq!(draft.language.as_deref(), Some("en"));
        assert!(draft.transcribed);

        let wav = stub.seen.lock().unwrap().clone().unwrap();
        assert!(!wav.exists(), "scratch audio should be removed");
    }

    #[tokio::test]
    async fn no_audio_stream_is_unsupported_media() {
        let err = extract_media(Path::new("silent.mp4"), &engines(0, transcriber(false)))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedMedia(msg) if msg.contains("no audio")));
    }

    #[tokio::test]
    async fn transcription_failure_cleans_up() {
        let stub = transcriber(true);
        let err = extract_media(Path::new("talk.mp3"), &engines(1, stub.clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::TranscriptionFailed(_)));
        let wav = stub.seen.lock().unwrap().clone().unwrap();
        assert!(!wav.parent().unwrap().exists());
    }

    #[test]
    fn timestamps_roll_over_minutes() {
        assert_eq!(timestamp(0.0), "[00:00]");
        assert_eq!(timestamp(59.9), "[00:59]");
        assert_eq!(timestamp(3601.0), "[60:01]");
    }
}
