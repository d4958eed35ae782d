//! Video probing and frame decoding through the system `ffmpeg`/`ffprobe`.

use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use framezoom_common::clock::{parse_rate, FrameClock};
use framezoom_common::error::{FramezoomError, FramezoomResult};
use framezoom_keyframe_model::frame::{FrameBuffer, PixelFormat};

use crate::pipeline::FrameSource;

/// Stream properties reported by `ffprobe`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct VideoInfo {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    pub codec: Option<String>,
    pub duration_secs: Option<f64>,
    pub frame_count: Option<u64>,
    pub has_audio: bool,
}

impl VideoInfo {
    pub fn fps(&self) -> f64 {
        if self.fps_den == 0 {
            0.0
        } else {
            f64::from(self.fps_num) / f64::from(self.fps_den)
        }
    }

    pub fn clock(&self) -> FramezoomResult<FrameClock> {
        FrameClock::from_ratio(self.fps_num, self.fps_den)
    }

    /// Rate string as ffmpeg expects it (`30000/1001`).
    pub fn rate_arg(&self) -> String {
        format!("{}/{}", self.fps_num, self.fps_den)
    }
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Probe the first video stream of `path`.
pub fn probe_video(path: &Path) -> FramezoomResult<VideoInfo> {
    if !path.exists() {
        return Err(FramezoomError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .output()
        .map_err(|e| FramezoomError::decode(format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(FramezoomError::decode(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_probe_output(path, &output.stdout)
}

fn parse_probe_output(path: &Path, json: &[u8]) -> FramezoomResult<VideoInfo> {
    let parsed: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| FramezoomError::decode(format!("ffprobe json parse failed: {e}")))?;

    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| FramezoomError::decode("no video stream found"))?;

    let width = stream
        .width
        .filter(|w| *w > 0)
        .ok_or_else(|| FramezoomError::decode("missing video width from ffprobe"))?;
    let height = stream
        .height
        .filter(|h| *h > 0)
        .ok_or_else(|| FramezoomError::decode("missing video height from ffprobe"))?;

    // avg_frame_rate is "0/0" for some streams; r_frame_rate is the fallback.
    let (fps_num, fps_den) = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| FramezoomError::decode("video stream reports no usable frame rate"))?;

    let duration_secs = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0);

    Ok(VideoInfo {
        path: path.to_path_buf(),
        width,
        height,
        fps_num,
        fps_den,
        codec: stream.codec_name.clone(),
        duration_secs,
        frame_count: stream.nb_frames.as_deref().and_then(|n| n.parse().ok()),
        has_audio: parsed
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio")),
    })
}

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Streams raw RGB frames out of an `ffmpeg` child process.
pub struct FfmpegDecoder {
    info: VideoInfo,
    format: PixelFormat,
    child: Option<Child>,
    stdout: Option<BufReader<ChildStdout>>,
    stderr_task: Option<JoinHandle<String>>,
    frames_read: u64,
    exhausted: bool,
}

impl std::fmt::Debug for FfmpegDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegDecoder")
            .field("path", &self.info.path)
            .field("frames_read", &self.frames_read)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

impl FfmpegDecoder {
    /// Start decoding a stream that has already been probed.
    pub fn spawn(info: VideoInfo) -> FramezoomResult<Self> {
        let format = PixelFormat::Rgb24;
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-nostdin", "-v", "error", "-i"])
            .arg(&info.path)
            .args([
                "-map",
                "0:v:0",
                "-an",
                "-sn",
                "-f",
                "rawvideo",
                "-pix_fmt",
                format.ffmpeg_name(),
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| FramezoomError::decode(format!("Failed to start ffmpeg decoder: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FramezoomError::decode("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FramezoomError::decode("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so a chatty ffmpeg cannot block on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut output = String::new();
            match BufReader::new(stderr).read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        tracing::info!(
            pid = child.id(),
            path = %info.path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps(),
            "ffmpeg decoder started"
        );

        Ok(Self {
            info,
            format,
            child: Some(child),
            stdout: Some(BufReader::new(stdout)),
            stderr_task: Some(stderr_task),
            frames_read: 0,
            exhausted: false,
        })
    }

    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    fn frame_len(&self) -> usize {
        FrameBuffer::byte_len(self.info.width, self.info.height, self.format)
    }

    fn join_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .and_then(|task| task.join().ok())
            .unwrap_or_default()
    }
}

impl FrameSource for FfmpegDecoder {
    fn next_frame(&mut self) -> FramezoomResult<Option<FrameBuffer>> {
        if self.exhausted {
            return Ok(None);
        }
        let frame_len = self.frame_len();
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut data = vec![0u8; frame_len];
        let filled = read_full(stdout, &mut data)
            .map_err(|e| FramezoomError::decode(format!("Failed reading decoded frame: {e}")))?;

        if filled == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        if filled < frame_len {
            self.exhausted = true;
            return Err(FramezoomError::decode(format!(
                "truncated frame {}: got {filled} of {frame_len} bytes",
                self.frames_read
            )));
        }

        self.frames_read += 1;
        FrameBuffer::new(self.info.width, self.info.height, self.format, data).map(Some)
    }

    fn close(&mut self) -> FramezoomResult<()> {
        drop(self.stdout.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if !self.exhausted {
            // Stopped early: the child is not expected to exit cleanly.
            let _ = child.kill();
            let _ = child.wait();
            self.join_stderr();
            tracing::debug!(frames = self.frames_read, "ffmpeg decoder stopped early");
            return Ok(());
        }

        let status = child
            .wait()
            .map_err(|e| FramezoomError::decode(format!("Failed to wait on ffmpeg decoder: {e}")))?;
        let stderr = self.join_stderr();

        if !status.success() {
            return Err(FramezoomError::decode(format!(
                "ffmpeg decode failed (status {status}): {}",
                stderr.trim()
            )));
        }

        tracing::debug!(frames = self.frames_read, "ffmpeg decoder finished");
        Ok(())
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        drop(self.stdout.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.join_stderr();
    }
}

/// Read until `buf` is full or the reader hits EOF; returns bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
