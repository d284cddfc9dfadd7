//! Pipe-streaming FFmpeg encoder session.
//!
//! One session per render: PNG frame buffers go in on the subprocess's
//! stdin in strict order, MP4 bytes come out on its stdout as encoding
//! progresses. Writing a frame awaits the pipe, so a slow encoder applies
//! backpressure to the producer instead of buffering unboundedly. The
//! container is laid out with `+faststart` so playback can begin before the
//! whole file has arrived.

use std::collections::VecDeque;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Lines of ffmpeg stderr retained for failure diagnostics.
const STDERR_TAIL_LINES: usize = 40;

/// Builder for the encoder invocation.
#[derive(Debug, Clone)]
pub struct EncoderCommand {
    /// Constant input/output frame rate.
    fps: u32,
    /// FFmpeg log level.
    log_level: String,
}

impl EncoderCommand {
    /// Create an encoder command for the given frame rate.
    pub fn new(fps: u32) -> Self {
        Self {
            fps,
            log_level: "error".to_string(),
        }
    }

    /// Set the ffmpeg log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    ///
    /// PNG image2pipe on stdin, H.264 yuv420p fast-start MP4 on stdout.
    pub fn build_args(&self) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-v".to_string(),
            self.log_level.clone(),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-vcodec".to_string(),
            "png".to_string(),
            "-r".to_string(),
            self.fps.to_string(),
            "-i".to_string(),
            "-".to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-f".to_string(),
            "mp4".to_string(),
            "-".to_string(),
        ]
    }
}

/// A running encoder subprocess for one render.
///
/// The child is spawned with `kill_on_drop`, so dropping the session on any
/// exit path reaps the process rather than leaking it past the request.
pub struct EncoderSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: JoinHandle<String>,
    timeout_secs: Option<u64>,
}

impl EncoderSession {
    /// Spawn the encoder subprocess.
    pub fn spawn(cmd: &EncoderCommand) -> MediaResult<Self> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Spawning FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("encoder stdin not captured"))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("encoder stderr not captured"))?;

        // Drain stderr for the lifetime of the process, keeping a tail for
        // failure logs. Detail never reaches the client.
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "ffmpeg", "{}", line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr_task,
            timeout_secs: None,
        })
    }

    /// Bound the total subprocess lifetime; exceeded means the session
    /// fails with [`MediaError::Timeout`] and the child is killed.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Take the subprocess stdout for the output pump.
    pub fn take_stdout(&mut self) -> MediaResult<ChildStdout> {
        self.child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("encoder stdout already taken"))
    }

    /// Write one fully-formed frame buffer to the encoder, in frame order.
    ///
    /// Suspends until the subprocess drains its input pipe. A broken pipe
    /// maps to [`MediaError::OutputClosed`]: the consumer went away and the
    /// frame loop should stop, not crash.
    pub async fn write_frame(&mut self, frame: &[u8]) -> MediaResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::internal("encoder input already closed"))?;

        stdin.write_all(frame).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                MediaError::OutputClosed
            } else {
                MediaError::Io(e)
            }
        })
    }

    /// Close the input stream, signaling end of frames.
    pub fn close_input(&mut self) {
        self.stdin.take();
    }

    /// Wait for the encoder to exit after all frames are written.
    ///
    /// Returns an error for a non-zero exit (with the stderr tail) or when
    /// the configured lifetime ceiling is exceeded.
    pub async fn finish(mut self) -> MediaResult<()> {
        self.close_input();

        let status = if let Some(secs) = self.timeout_secs {
            match tokio::time::timeout(
                std::time::Duration::from_secs(secs),
                self.child.wait(),
            )
            .await
            {
                Ok(result) => result?,
                Err(_) => {
                    warn!("FFmpeg timed out after {} seconds, killing process", secs);
                    let _ = self.child.kill().await;
                    self.stderr_task.abort();
                    return Err(MediaError::Timeout(secs));
                }
            }
        } else {
            self.child.wait().await?
        };

        let stderr_tail = self.stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::encoder_failed(
                "FFmpeg exited with non-zero status",
                (!stderr_tail.is_empty()).then_some(stderr_tail),
                status.code(),
            ))
        }
    }

    /// Kill the subprocess immediately. Used on cancellation paths.
    pub async fn abort(mut self) {
        self.close_input();
        let _ = self.child.kill().await;
        self.stderr_task.abort();
    }
}
