//! # Video stream
//!
//! Wraps the camera-to-station video pipeline, which runs entirely outside
//! this process: `rpicam-vid` captures and encodes H.264, piped into a
//! `gst-launch-1.0` pipeline which RTP-packetises it and fires it at the
//! station over UDP.
//!
//! Video is best-effort. A robot without video is still a robot, so nothing
//! in here is allowed to take the control loop down.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use serde::Deserialize;
use thiserror::Error;

use std::process::{Child, Command, Stdio};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the video stream.
#[derive(Debug, Deserialize)]
pub struct Params {
    /// Station address to send the RTP stream to.
    pub dest_ip: String,

    /// Station port to send the RTP stream to.
    pub dest_port: u16,

    /// Capture width in pixels.
    pub width: u32,

    /// Capture height in pixels.
    pub height: u32,

    /// Capture framerate.
    pub framerate: u32,

    /// H.264 encoder bitrate in bits per second.
    pub bitrate: u32,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            dest_ip: String::from("192.168.50.142"),
            dest_port: 5600,
            width: 1280,
            height: 720,
            framerate: 30,
            bitrate: 4_000_000,
        }
    }
}

/// Handle on the running video pipeline subprocess.
pub struct VideoStream {
    params: Params,

    child: Option<Child>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while starting the video pipeline.
#[derive(Debug, Error)]
pub enum VideoStreamError {
    #[error("Could not start the video pipeline: {0}")]
    SpawnError(std::io::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VideoStream {
    pub fn new(params: Params) -> Self {
        VideoStream {
            params,
            child: None,
        }
    }

    /// Build the shell pipeline string for the current parameters.
    fn pipeline(&self) -> String {
        format!(
            "rpicam-vid -t 0 --width {} --height {} --framerate {} \
             --codec h264 --bitrate {} --profile baseline --intra 30 --inline \
             --nopreview -o - | \
             gst-launch-1.0 fdsrc ! h264parse ! \
             rtph264pay config-interval=1 pt=96 ! \
             udpsink host={} port={} sync=false async=false",
            self.params.width,
            self.params.height,
            self.params.framerate,
            self.params.bitrate,
            self.params.dest_ip,
            self.params.dest_port
        )
    }

    /// Start the pipeline subprocess.
    ///
    /// Spawn failure is reported but callers are expected to treat it as
    /// non-fatal.
    pub fn start(&mut self) -> Result<(), VideoStreamError> {
        if self.child.is_some() {
            return Ok(());
        }

        let child = Command::new("sh")
            .arg("-c")
            .arg(self.pipeline())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(VideoStreamError::SpawnError)?;

        info!(
            "Video stream started -> {}:{}",
            self.params.dest_ip, self.params.dest_port
        );

        self.child = Some(child);

        Ok(())
    }

    /// Stop the pipeline subprocess if it is running.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            match child.try_wait() {
                // Already dead
                Ok(Some(status)) => {
                    warn!("Video pipeline had already exited ({})", status);
                }
                _ => {
                    if let Err(e) = child.kill() {
                        warn!("Could not kill the video pipeline: {}", e);
                    }
                    if let Err(e) = child.wait() {
                        warn!("Could not reap the video pipeline: {}", e);
                    } else {
                        info!("Video stream stopped");
                    }
                }
            }
        }
    }

    /// True if the pipeline was started and has not been stopped.
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for VideoStream {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pipeline_string() {
        let stream = VideoStream::new(Params {
            dest_ip: String::from("10.0.0.2"),
            dest_port: 5600,
            width: 640,
            height: 480,
            framerate: 25,
            bitrate: 1_000_000,
        });

        let p = stream.pipeline();
        assert!(p.contains("--width 640"));
        assert!(p.contains("--height 480"));
        assert!(p.contains("--framerate 25"));
        assert!(p.contains("--bitrate 1000000"));
        assert!(p.contains("udpsink host=10.0.0.2 port=5600"));
    }

    #[test]
    fn test_not_running_before_start() {
        let stream = VideoStream::new(Params::default());
        assert!(!stream.is_running());
    }
}
