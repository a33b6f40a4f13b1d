//! # Serial Communication Module
//!
//! Handles the two serial links to the survey hardware.
//!
//! This module handles:
//! - Opening the NMEA and modem ports (8N1, no flow control)
//! - Splitting a port into read and write halves
//! - Reading line-oriented traffic until cancelled

pub mod port_trait;

use futures::StreamExt;
use tokio::io::{AsyncRead, ReadHalf, WriteHalf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SurveyError};

/// Longest line accepted from either port; longer lines are discarded
pub const MAX_LINE_LENGTH: usize = 1024;

/// Either byte ends a line, so `\r\n` and bare `\n` both work
const LINE_DELIMITERS: &[u8] = b"\r\n";

/// An open serial port
pub struct SerialLink {
    /// Serial port handle
    port: SerialStream,
    /// Device path (e.g., /dev/ttyUSB0)
    device_path: String,
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("device_path", &self.device_path)
            .finish_non_exhaustive()
    }
}

impl SerialLink {
    /// Open a serial port
    ///
    /// # Arguments
    ///
    /// * `path` - Device path (e.g., "/dev/ttyUSB0" or "COM4")
    /// * `baud_rate` - Line speed, 9600 for most GPS receivers and modems
    ///
    /// # Errors
    ///
    /// Returns `Serial` if the device cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use signal_survey::serial::SerialLink;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let link = SerialLink::open("/dev/ttyUSB0", 9600)?;
    ///     println!("Connected to: {}", link.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        debug!("Opening serial port {} at {} baud", path, baud_rate);

        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| SurveyError::Serial(format!("Failed to open {}: {}", path, e)))?;

        info!("Opened serial port {}", path);
        Ok(Self {
            port,
            device_path: path.to_string(),
        })
    }

    /// Get the device path of the opened serial port
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Split into independent read and write halves
    pub fn split(self) -> (ReadHalf<SerialStream>, WriteHalf<SerialStream>) {
        tokio::io::split(self.port)
    }

    /// The whole stream, for ports that are only read
    pub fn into_stream(self) -> SerialStream {
        self.port
    }
}

/// Feed every line from `reader` to `on_line` until EOF or cancellation
///
/// Empty lines are skipped. Bytes that are not UTF-8 are replaced rather than
/// failing the line, since serial noise is common right after opening a port.
///
/// # Arguments
///
/// * `name` - Port name used in log messages
/// * `reader` - Read half of the port
/// * `cancel` - Stops the listener between lines
/// * `on_line` - Called once per line, without its terminator
pub async fn listen_lines<R, F>(name: &str, reader: R, cancel: CancellationToken, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let codec =
        AnyDelimiterCodec::new_with_max_length(LINE_DELIMITERS.to_vec(), Vec::new(), MAX_LINE_LENGTH);
    let mut lines = FramedRead::new(reader, codec);
    // A decode error ends the current read with one `None`; the next poll resumes
    let mut recovering = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("{} listener stopped", name);
                break;
            }
            next = lines.next() => match next {
                Some(Ok(chunk)) => {
                    recovering = false;
                    if chunk.is_empty() {
                        continue;
                    }
                    let line = String::from_utf8_lossy(&chunk);
                    on_line(&line);
                }
                Some(Err(e)) => {
                    warn!("{}: discarding unreadable input: {}", name, e);
                    recovering = true;
                }
                None if recovering => {
                    recovering = false;
                }
                None => {
                    warn!("{} port closed", name);
                    break;
                }
            }
        }
    }
}
