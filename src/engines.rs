//! Boundaries to the external extraction engines.
//!
//! The PDF text layer, the OCR engine, the media toolkit and the
//! transcription engine are traits so the pipeline can be driven with stubs in
//! tests. The command-line implementations shell out to the usual tools:
//! `pdftoppm` + `tesseract` for OCR, `ffprobe` + `ffmpeg` for media and the
//! whisper.cpp CLI for transcription.
//!
//! Child processes are spawned with `kill_on_drop`, so dropping an extraction
//! future also stops the tool it is waiting on.

use crate::config::ExtractionConfig;
use crate::extract::ExtractError;
use crate::pdf::PdfExtractText;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use tokio::process::Command;

/// Per-page PDF text layer.
pub trait PdfTextLayer: Send + Sync {
    /// Embedded text of every page, in page order.
    fn page_texts(&self, pdf_bytes: &[u8]) -> Result<Vec<String>, ExtractError>;
}

/// OCR engine abstraction.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize the text of one page (1-based) of the PDF at `pdf`.
    async fn recognize_page(&self, pdf: &Path, page_number: usize) -> Result<String, ExtractError>;
}

/// Stream facts reported by the media toolkit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub duration_secs: Option<f64>,
    pub audio_streams: usize,
    pub video_streams: usize,
    pub format_name: Option<String>,
}

/// Probing and audio track extraction for audio/video containers.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    async fn probe(&self, media: &Path) -> Result<MediaInfo, ExtractError>;

    /// Write the first audio track of `media` to `wav_out` as 16 kHz mono PCM.
    async fn extract_audio(&self, media: &Path, wav_out: &Path) -> Result<(), ExtractError>;
}

/// One timed piece of a transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
    pub language: Option<String>,
}

/// Speech-to-text engine abstraction.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a 16 kHz mono WAV file. Output files, if any, go next to `wav`.
    async fn transcribe(&self, wav: &Path) -> Result<Transcript, ExtractError>;
}

/// The engines one pipeline uses, shared across requests.
#[derive(Clone)]
pub struct ExtractionEngines {
    pub pdf: Arc<dyn PdfTextLayer>,
    pub ocr: Arc<dyn OcrEngine>,
    pub media: Arc<dyn MediaToolkit>,
    pub transcriber: Arc<dyn Transcriber>,
}

impl ExtractionEngines {
    /// Command-line engines configured from `[extraction]`.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let ocr: Arc<dyn OcrEngine> = if config.ocr_enabled {
            Arc::new(TesseractOcr::new(
                &config.tesseract_command,
                &config.pdf_render_command,
            ))
        } else {
            Arc::new(DisabledOcr)
        };

        Self {
            pdf: Arc::new(PdfExtractText),
            ocr,
            media: Arc::new(FfmpegToolkit::new(
                &config.ffmpeg_command,
                &config.ffprobe_command,
            )),
            transcriber: Arc::new(WhisperCli::new(
                &config.whisper_command,
                &config.whisper_model,
            )),
        }
    }

    /// Text layer only: OCR, media and transcription all refuse to run.
    pub fn disabled() -> Self {
        Self {
            pdf: Arc::new(PdfExtractText),
            ocr: Arc::new(DisabledOcr),
            media: Arc::new(DisabledMedia),
            transcriber: Arc::new(DisabledMedia),
        }
    }
}

/// Start `program` with stdin closed and `kill_on_drop` set.
fn tool(program: &str) -> Command {
    let mut command = Command::new(program);
    command.stdin(std::process::Stdio::null()).kill_on_drop(true);
    command
}

/// Spawn a tool and wait for it to exit.
async fn spawn_output(command: &mut Command) -> Result<Output, String> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    command
        .output()
        .await
        .map_err(|e| format!("could not start {program}: {e}"))
}

/// Run a prepared command, returning its output or a readable failure.
async fn run_command(command: &mut Command) -> Result<Output, String> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    let output = spawn_output(command).await?;
    if output.status.success() {
        Ok(output)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.lines().last().unwrap_or("").trim().to_string();
        Err(format!("{program} exited with {}: {detail}", output.status))
    }
}

/// OCR through `pdftoppm` (page rendering) and `tesseract` (recognition).
pub struct TesseractOcr {
    tesseract: String,
    renderer: String,
}

impl TesseractOcr {
    pub fn new(tesseract: &str, renderer: &str) -> Self {
        Self {
            tesseract: tesseract.to_string(),
            renderer: renderer.to_string(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize_page(&self, pdf: &Path, page_number: usize) -> Result<String, ExtractError> {
        let scratch = tempfile::Builder::new()
            .prefix("lucid-ocr-")
            .tempdir()
            .map_err(|e| ExtractError::OcrFailed(e.to_string()))?;
        let prefix = scratch.path().join("page");
        let page = page_number.to_string();

        run_command(
            tool(&self.renderer)
                .args(["-f", page.as_str(), "-l", page.as_str()])
                .args(["-r", "300", "-singlefile", "-png"])
                .arg(pdf)
                .arg(&prefix),
        )
        .await
        .map_err(ExtractError::OcrFailed)?;

        let image = prefix.with_extension("png");
        let output = run_command(
            tool(&self.tesseract)
                .arg(&image)
                .arg("stdout")
                .args(["--psm", "6"]),
        )
        .await
        .map_err(ExtractError::OcrFailed)?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// OCR engine used when OCR is switched off.
pub struct DisabledOcr;

#[async_trait]
impl OcrEngine for DisabledOcr {
    async fn recognize_page(&self, _pdf: &Path, page_number: usize) -> Result<String, ExtractError> {
        Err(ExtractError::OcrFailed(format!(
            "OCR is disabled, page {page_number} has no text layer"
        )))
    }
}

/// Media engine used when audio/video support is switched off.
pub struct DisabledMedia;

#[async_trait]
impl MediaToolkit for DisabledMedia {
    async fn probe(&self, media: &Path) -> Result<MediaInfo, ExtractError> {
        Err(ExtractError::UnsupportedMedia(format!(
            "media support is disabled: {}",
            media.display()
        )))
    }

    async fn extract_audio(&self, media: &Path, _wav_out: &Path) -> Result<(), ExtractError> {
        self.probe(media).await.map(|_| ())
    }
}

#[async_trait]
impl Transcriber for DisabledMedia {
    async fn transcribe(&self, _wav: &Path) -> Result<Transcript, ExtractError> {
        Err(ExtractError::TranscriptionFailed(
            "transcription is disabled".to_string(),
        ))
    }
}

/// `ffprobe` for stream facts, `ffmpeg` for the audio track.
pub struct FfmpegToolkit {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegToolkit {
    pub fn new(ffmpeg: &str, ffprobe: &str) -> Self {
        Self {
            ffmpeg: ffmpeg.to_string(),
            ffprobe: ffprobe.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    format_name: Option<String>,
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe(json: &[u8]) -> Result<MediaInfo, ExtractError> {
    let probe: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| ExtractError::UnsupportedMedia(format!("unreadable probe output: {e}")))?;

    let count = |kind: &str| {
        probe
            .streams
            .iter()
            .filter(|s| s.codec_type.as_deref() == Some(kind))
            .count()
    };

    Ok(MediaInfo {
        duration_secs: probe
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok()),
        audio_streams: count("audio"),
        video_streams: count("video"),
        format_name: probe.format.and_then(|f| f.format_name),
    })
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe(&self, media: &Path) -> Result<MediaInfo, ExtractError> {
        let mut command = tool(&self.ffprobe);
        command
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(media);

        let output = spawn_output(&mut command)
            .await
            .map_err(ExtractError::UnreadableFile)?;
        if !output.status.success() {
            return Err(ExtractError::UnsupportedMedia(format!(
                "{} could not read the container: {}",
                self.ffprobe,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_probe(&output.stdout)
    }

    async fn extract_audio(&self, media: &Path, wav_out: &Path) -> Result<(), ExtractError> {
        run_command(
            tool(&self.ffmpeg)
                .args(["-nostdin", "-v", "error", "-y", "-i"])
                .arg(media)
                .args(["-vn", "-ac", "1", "-ar", "16000", "-c:a", "pcm_s16le"])
                .arg(wav_out),
        )
        .await
        .map(|_| ())
        .map_err(ExtractError::UnsupportedMedia)
    }
}

/// The whisper.cpp command-line transcriber (`whisper-cli`).
pub struct WhisperCli {
    command: String,
    model: PathBuf,
}

impl WhisperCli {
    pub fn new(command: &str, model: &Path) -> Self {
        Self {
            command: command.to_string(),
            model: model.to_path_buf(),
        }
    }
}

#[derive(Deserialize)]
struct WhisperJson {
    result: Option<WhisperResult>,
    #[serde(default)]
    transcription: Vec<WhisperSegment>,
}

#[derive(Deserialize)]
struct WhisperResult {
    language: Option<String>,
}

#[derive(Deserialize)]
struct WhisperSegment {
    offsets: WhisperOffsets,
    text: String,
}

/// Segment offsets in milliseconds.
#[derive(Deserialize)]
struct WhisperOffsets {
    from: u64,
    to: u64,
}

/// Parse the JSON file whisper.cpp writes with `-oj`.
pub fn parse_whisper_json(json: &[u8]) -> Result<Transcript, ExtractError> {
    let parsed: WhisperJson = serde_json::from_slice(json)
        .map_err(|e| ExtractError::TranscriptionFailed(format!("unreadable transcript: {e}")))?;

    let segments = parsed
        .transcription
        .into_iter()
        .map(|segment| TranscriptSegment {
            start_secs: segment.offsets.from as f64 / 1000.0,
            end_secs: segment.offsets.to as f64 / 1000.0,
            text: segment.text.trim().to_string(),
        })
        .filter(|segment| !segment.text.is_empty())
        .collect();

    Ok(Transcript {
        segments,
        language: parsed
            .result
            .and_then(|r| r.language)
            .filter(|lang| !lang.is_empty() && lang != "auto"),
    })
}

#[async_trait]
impl Transcriber for WhisperCli {
    async fn transcribe(&self, wav: &Path) -> Result<Transcript, ExtractError> {
        let prefix = wav.with_extension("");
        run_command(
            tool(&self.command)
                .arg("-m")
                .arg(&self.model)
                .arg("-f")
                .arg(wav)
                .args(["-l", "auto", "-oj", "-np", "-of"])
                .arg(&prefix),
        )
        .await
        .map_err(ExtractError::TranscriptionFailed)?;

        let json_path = prefix.with_extension("json");
        let json = tokio::fs::read(&json_path).await.map_err(|e| {
            ExtractError::TranscriptionFailed(format!("{}: {e}", json_path.display()))
        })?;
        parse_whisper_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_counts_streams_and_duration() {
        let json = br#"{
            "streams": [
                {"index": 0, "codec_type": "video", "codec_name": "h264"},
                {"index": 1, "codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "2400.040000"}
        }"#;
        let info = parse_probe(json).unwrap();
        assert_eq!(info.audio_streams, 1);
        assert_eq!(info.video_streams, 1);
        assert_eq!(info.duration_secs, Some(2400.04));
        assert_eq!(info.format_name.as_deref(), Some("mov,mp4,m4a,3gp,3g2,mj2"));
    }

    #[test]
    fn probe_without_audio_reports_zero_streams() {
        let json = br#"{"streams": [{"codec_type": "video"}], "format": {}}"#;
        let info = parse_probe(json).unwrap();
        assert_eq!(info.audio_streams, 0);
        assert_eq!(info.duration_secs, None);
    }

    #[test]
    fn probe_garbage_is_unsupported_media() {
        assert!(matches!(
            parse_probe(b"not json"),
            Err(ExtractError::UnsupportedMedia(_))
        ));
    }

    #[test]
    fn whisper_json_becomes_ordered_segments() {
        let json = br#"{
            "result": {"language": "en"},
            "transcription": [
                {"timestamps": {"from": "00:00:00,000", "to": "00:00:04,000"},
                 "offsets": {"from": 0, "to": 4000}, "text": " Welcome to the lecture."},
                {"offsets": {"from": 4000, "to": 4500}, "text": "  "},
                {"offsets": {"from": 65000, "to": 70000}, "text": " Today: memory."}
            ]
        }"#;
        let transcript = parse_whisper_json(json).unwrap();
        assert_eq!(transcript.language.as_deref(), Some("en"));
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[0].text, "Welcome to the lecture.");
        assert_eq!(transcript.segments[1].start_secs, 65.0);
    }

    #[tokio::test]
    async fn disabled_engines_refuse_work() {
        let engines = ExtractionEngines::disabled();
        let path = Path::new("clip.mp4");
        assert!(matches!(
            engines.ocr.recognize_page(path, 1).await,
            Err(ExtractError::OcrFailed(_))
        ));
        assert!(matches!(
            engines.media.probe(path).await,
            Err(ExtractError::UnsupportedMedia(_))
        ));
        assert!(matches!(
            engines.transcriber.transcribe(path).await,
            Err(ExtractError::TranscriptionFailed(_))
        ));
    }

    #[tokio::test]
    async fn missing_tool_is_reported_not_panicked() {
        let ocr = TesseractOcr::new("lucid-no-such-tesseract", "lucid-no-such-pdftoppm");
        let err = ocr.recognize_page(Path::new("scan.pdf"), 1).await.unwrap_err();
        assert!(matches!(err, ExtractError::OcrFailed(msg) if msg.contains("could not start")));
    }
}
