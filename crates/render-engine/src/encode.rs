//! Frame encoding through the system `ffmpeg`.
//!
//! Raw frames are piped to an ffmpeg child on stdin. In [`EncodeMode::Direct`]
//! that child writes the target file. In [`EncodeMode::TwoStep`] it writes a
//! lossless FFV1/Matroska intermediate into the job's scratch space, and
//! [`FfmpegEncoder::finish`] runs a second ffmpeg pass that transcodes the
//! intermediate into the target codec.

use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use anyhow::Context as _;

use framezoom_common::config::{EncodeMode, EncoderSettings};
use framezoom_common::error::{FramezoomError, FramezoomResult};
use framezoom_common::scratch::ScratchSpace;
use framezoom_keyframe_model::frame::{FrameBuffer, PixelFormat};

use crate::decode::VideoInfo;
use crate::pipeline::FrameSink;

/// Shape and rate of the raw frames fed to the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub fps_num: u32,
    pub fps_den: u32,
}

impl StreamSpec {
    pub fn from_info(info: &VideoInfo, format: PixelFormat) -> Self {
        Self {
            width: info.width,
            height: info.height,
            format,
            fps_num: info.fps_num,
            fps_den: info.fps_den,
        }
    }

    pub fn validate(&self) -> FramezoomResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FramezoomError::encode("encode width/height must be non-zero"));
        }
        if self.fps_num == 0 || self.fps_den == 0 {
            return Err(FramezoomError::encode("encode frame rate must be non-zero"));
        }
        Ok(())
    }

    fn frame_len(&self) -> usize {
        FrameBuffer::byte_len(self.width, self.height, self.format)
    }
}

/// ffmpeg arguments selecting the target codec.
pub fn codec_args(settings: &EncoderSettings) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        settings.video_codec.clone(),
        "-crf".to_string(),
        settings.crf.to_string(),
        "-b:v".to_string(),
        settings.video_bitrate.clone(),
        "-threads".to_string(),
        settings.threads.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]
}

/// ffmpeg arguments for the lossless intermediate.
fn intermediate_args() -> Vec<String> {
    ["-c:v", "ffv1", "-level", "3", "-f", "matroska"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// ffmpeg arguments describing raw frames arriving on stdin.
fn raw_input_args(spec: &StreamSpec) -> Vec<String> {
    vec![
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        spec.format.ffmpeg_name().to_string(),
        "-s".to_string(),
        format!("{}x{}", spec.width, spec.height),
        "-r".to_string(),
        format!("{}/{}", spec.fps_num, spec.fps_den),
        "-i".to_string(),
        "pipe:0".to_string(),
        "-an".to_string(),
    ]
}

fn ensure_parent_dir(path: &Path) -> FramezoomResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Remove a partially written file, tolerating its absence.
fn discard_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}

/// Pipes raw frames into ffmpeg and produces the target file.
pub struct FfmpegEncoder {
    spec: StreamSpec,
    settings: EncoderSettings,
    output: PathBuf,
    intermediate: Option<PathBuf>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    frames_written: u64,
    closed: bool,
}

impl std::fmt::Debug for FfmpegEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegEncoder")
            .field("output", &self.output)
            .field("intermediate", &self.intermediate)
            .field("frames_written", &self.frames_written)
            .field("closed", &self.closed)
            .finish()
    }
}

impl FfmpegEncoder {
    /// Start an encoder in the mode selected by `settings`.
    ///
    /// Two-step intermediates are reserved inside `scratch` so they are
    /// removed with the rest of the job's artifacts.
    pub fn create(
        output: &Path,
        spec: StreamSpec,
        settings: &EncoderSettings,
        scratch: &mut ScratchSpace,
    ) -> FramezoomResult<Self> {
        let intermediate = match settings.mode {
            EncodeMode::Direct => None,
            EncodeMode::TwoStep => Some(scratch.file("intermediate.mkv")),
        };
        Self::start(output, intermediate, spec, settings)
    }

    fn start(
        output: &Path,
        intermediate: Option<PathBuf>,
        spec: StreamSpec,
        settings: &EncoderSettings,
    ) -> FramezoomResult<Self> {
        spec.validate()?;
        ensure_parent_dir(output)?;

        let mut args = vec!["-y".to_string(), "-loglevel".to_string(), "error".to_string()];
        args.extend(raw_input_args(&spec));
        let first_target = match &intermediate {
            Some(path) => {
                args.extend(intermediate_args());
                path.clone()
            }
            None => {
                args.extend(codec_args(settings));
                output.to_path_buf()
            }
        };

        tracing::debug!(args = ?args, target = %first_target.display(), "Running ffmpeg encoder");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .arg(&first_target)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                FramezoomError::encode(format!(
                    "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| FramezoomError::encode("failed to open ffmpeg stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FramezoomError::encode("failed to capture ffmpeg stderr"))?;
        let stderr_task = std::thread::spawn(move || -> String {
            let mut output = String::new();
            match BufReader::new(stderr).read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(
            pid = child.id(),
            mode = if intermediate.is_some() { "two-step" } else { "direct" },
            codec = %settings.video_codec,
            output = %output.display(),
            "ffmpeg encoder started"
        );

        Ok(Self {
            spec,
            settings: settings.clone(),
            output: output.to_path_buf(),
            intermediate,
            child: Some(child),
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
            frames_written: 0,
            closed: false,
        })
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn join_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .and_then(|task| task.join().ok())
            .unwrap_or_default()
    }

    /// Close stdin and wait for the first ffmpeg pass.
    fn wait_first_pass(&mut self) -> FramezoomResult<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Err(FramezoomError::encode("ffmpeg encoder is not running"));
        };
        let status = child
            .wait()
            .map_err(|e| FramezoomError::encode(format!("failed to wait for ffmpeg: {e}")))?;
        let stderr = self.join_stderr();
        if !status.success() {
            return Err(FramezoomError::encode(format!(
                "ffmpeg exited with status {status}: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn transcode(&self, intermediate: &Path) -> FramezoomResult<()> {
        let mut args = vec![
            "-y".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
        ];
        args.push(intermediate.display().to_string());
        args.extend(codec_args(&self.settings));

        tracing::debug!(args = ?args, output = %self.output.display(), "Running ffmpeg transcode");
        let output = Command::new("ffmpeg")
            .args(&args)
            .arg(&self.output)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| FramezoomError::encode(format!("failed to run ffmpeg transcode: {e}")))?;

        if !output.status.success() {
            return Err(FramezoomError::encode(format!(
                "ffmpeg transcode failed (status {}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn kill_child(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.join_stderr();
    }
}

impl FrameSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &FrameBuffer) -> FramezoomResult<()> {
        if frame.dimensions() != (self.spec.width, self.spec.height)
            || frame.format() != self.spec.format
        {
            return Err(FramezoomError::encode(format!(
                "frame shape mismatch: got {}x{} {:?}, expected {}x{} {:?}",
                frame.width(),
                frame.height(),
                frame.format(),
                self.spec.width,
                self.spec.height,
                self.spec.format
            )));
        }
        debug_assert_eq!(frame.data().len(), self.spec.frame_len());

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(FramezoomError::encode("ffmpeg encoder is already finalized"));
        };
        stdin.write_all(frame.data()).map_err(|e| {
            FramezoomError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> FramezoomResult<()> {
        if self.closed {
            return Err(FramezoomError::encode("ffmpeg encoder is already finalized"));
        }
        self.closed = true;

        let result = self.wait_first_pass().and_then(|()| match self.intermediate.clone() {
            Some(intermediate) => {
                let transcoded = self.transcode(&intermediate);
                discard_partial(&intermediate);
                transcoded
            }
            None => Ok(()),
        });

        match result {
            Ok(()) => {
                tracing::info!(
                    frames = self.frames_written,
                    output = %self.output.display(),
                    "Encoding finished"
                );
                Ok(())
            }
            Err(err) => {
                self.kill_child();
                discard_partial(&self.output);
                if let Some(intermediate) = &self.intermediate {
                    discard_partial(intermediate);
                }
                Err(err)
            }
        }
    }

    fn abort(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.kill_child();
        discard_partial(&self.output);
        if let Some(intermediate) = &self.intermediate {
            discard_partial(intermediate);
        }
        tracing::info!(
            frames = self.frames_written,
            output = %self.output.display(),
            "Encoding aborted, partial output discarded"
        );
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if !self.closed {
            self.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> StreamSpec {
        StreamSpec {
            width: 320,
            height: 240,
            format: PixelFormat::Rgb24,
            fps_num: 30000,
            fps_den: 1001,
        }
    }

    #[test]
    fn test_codec_args_follow_settings() {
        let args = codec_args(&EncoderSettings::default());
        assert_eq!(
            args,
            vec![
                "-c:v",
                "libvpx-vp9",
                "-crf",
                "30",
                "-b:v",
                "0",
                "-threads",
                "4",
                "-pix_fmt",
                "yuv420p"
            ]
        );
    }

    #[test]
    fn test_raw_input_args_describe_frames() {
        let args = raw_input_args(&spec());
        let joined = args.join(" ");
        assert!(joined.contains("-pix_fmt rgb24"));
        assert!(joined.contains("-s 320x240"));
        assert!(joined.contains("-r 30000/1001"));
        assert!(joined.ends_with("-i pipe:0 -an"));
    }

    #[test]
    fn test_intermediate_is_lossless_matroska() {
        let args = intermediate_args().join(" ");
        assert!(args.contains("-c:v ffv1"));
        assert!(args.contains("-f matroska"));
    }

    #[test]
    fn test_spec_validation() {
        assert!(spec().validate().is_ok());
        let zero = StreamSpec { width: 0, ..spec() };
        assert!(matches!(zero.validate(), Err(FramezoomError::Encode { .. })));
        let no_rate = StreamSpec { fps_den: 0, ..spec() };
        assert!(no_rate.validate().is_err());
    }

    #[test]
    fn test_discard_partial_tolerates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.webm");
        discard_partial(&path);
        std::fs::write(&path, b"partial").unwrap();
        discard_partial(&path);
        assert!(!path.exists());
    }
}
