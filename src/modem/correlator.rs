//! # Modem Query Correlator
//!
//! Pairs each `AT+CSQ` query with the next `+CSQ: ` response line.
//!
//! A query registers an in-flight token *before* the command is written, so
//! only a response arriving after the write can resolve it. Responses with no
//! query in flight, including late answers to a query that already timed
//! out, are dropped instead of being handed to the next caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::{Result, SurveyError};
use crate::model::SignalSample;
use crate::serial::port_trait::SerialPortIO;

/// Signal quality query command
pub const CSQ_COMMAND: &str = "AT+CSQ";

/// Prefix of the modem's signal quality response
pub const CSQ_RESPONSE_PREFIX: &str = "+CSQ: ";

/// Line terminator for AT commands
pub const AT_LINE_TERMINATOR: &str = "\r\n";

/// Default time to wait for the modem's answer
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Extract the value following `prefix` in a response line
///
/// # Examples
///
/// ```
/// use signal_survey::modem::correlator::{parse_response, CSQ_RESPONSE_PREFIX};
///
/// assert_eq!(parse_response("+CSQ: 15,99", CSQ_RESPONSE_PREFIX), Some("15,99"));
/// assert_eq!(parse_response("OK", CSQ_RESPONSE_PREFIX), None);
/// ```
pub fn parse_response<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let start = line.find(prefix)? + prefix.len();
    let value = line[start..].trim();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

struct PendingQuery {
    token: u64,
    reply: oneshot::Sender<SignalSample>,
}

/// Issues signal quality queries and matches their responses
pub struct ModemCorrelator {
    /// Command channel; the async lock also serializes queries
    writer: tokio::sync::Mutex<Box<dyn SerialPortIO>>,
    pending: Mutex<Option<PendingQuery>>,
    next_token: AtomicU64,
    command: String,
    response_prefix: String,
    timeout: Duration,
}

impl ModemCorrelator {
    /// Create a correlator for the standard `AT+CSQ` exchange
    pub fn new(writer: Box<dyn SerialPortIO>, timeout: Duration) -> Self {
        Self::with_protocol(writer, timeout, CSQ_COMMAND, CSQ_RESPONSE_PREFIX)
    }

    /// Create a correlator for a custom command/response pair
    pub fn with_protocol(
        writer: Box<dyn SerialPortIO>,
        timeout: Duration,
        command: &str,
        response_prefix: &str,
    ) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(writer),
            pending: Mutex::new(None),
            next_token: AtomicU64::new(1),
            command: format!("{}{}", command, AT_LINE_TERMINATOR),
            response_prefix: response_prefix.to_string(),
            timeout,
        }
    }

    /// Token of the query currently waiting for a response, if any
    pub fn in_flight(&self) -> Option<u64> {
        self.lock_pending().as_ref().map(|p| p.token)
    }

    /// Query the modem and wait for its answer
    ///
    /// Concurrent callers are served one after another.
    ///
    /// # Errors
    ///
    /// - `Serial` if writing or flushing the command fails
    /// - `QueryTimeout` if no response line arrives within the timeout
    pub async fn query(&self) -> Result<SignalSample> {
        let mut writer = self.writer.lock().await;

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        *self.lock_pending() = Some(PendingQuery { token, reply: tx });

        trace!("Sending query #{}", token);
        if let Err(e) = send(&mut **writer, self.command.as_bytes()).await {
            self.clear(token);
            return Err(SurveyError::Serial(format!(
                "Failed to send {}: {}",
                self.command.trim_end(),
                e
            )));
        }

        let outcome = tokio::time::timeout(self.timeout, rx).await;
        drop(writer);

        match outcome {
            Ok(Ok(sample)) => {
                debug!("Query #{} answered: {}", token, sample);
                Ok(sample)
            }
            Ok(Err(_)) | Err(_) => {
                self.clear(token);
                Err(SurveyError::QueryTimeout(self.timeout))
            }
        }
    }

    /// Offer one line read from the command channel
    ///
    /// Returns `true` if the line answered the query in flight.
    pub fn handle_line(&self, line: &str) -> bool {
        let Some(value) = parse_response(line, &self.response_prefix) else {
            return false;
        };

        match self.lock_pending().take() {
            Some(pending) => {
                if pending.reply.send(SignalSample::new(value)).is_err() {
                    // The waiter gave up between the timeout and clear()
                    debug!("Response for query #{} arrived after it was abandoned", pending.token);
                    return false;
                }
                true
            }
            None => {
                warn!("Dropping unsolicited modem response '{}'", line);
                false
            }
        }
    }

    fn clear(&self, token: u64) {
        let mut pending = self.lock_pending();
        if pending.as_ref().is_some_and(|p| p.token == token) {
            *pending = None;
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<PendingQuery>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn send(writer: &mut dyn SerialPortIO, data: &[u8]) -> std::io::Result<()> {
    writer.write_all(data).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::port_trait::mocks::MockSerialPort;
    use std::io;
    use std::sync::Arc;

    fn correlator(port: &MockSerialPort) -> Arc<ModemCorrelator> {
        Arc::new(ModemCorrelator::new(
            Box::new(port.clone()),
            DEFAULT_QUERY_TIMEOUT,
        ))
    }

    async fn wait_for_in_flight(correlator: &ModemCorrelator) -> u64 {
        loop {
            if let Some(token) = correlator.in_flight() {
                return token;
            }
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_parse_response() {
        assert_eq!(parse_response("+CSQ: 15,99", CSQ_RESPONSE_PREFIX), Some("15,99"));
        assert_eq!(parse_response("  +CSQ: 31,0  ", CSQ_RESPONSE_PREFIX), Some("31,0"));
        assert_eq!(parse_response("AT+CSQ", CSQ_RESPONSE_PREFIX), None);
        assert_eq!(parse_response("OK", CSQ_RESPONSE_PREFIX), None);
        assert_eq!(parse_response("+CSQ: ", CSQ_RESPONSE_PREFIX), None);
    }

    #[tokio::test]
    async fn test_query_writes_command_and_resolves() {
        let port = MockSerialPort::new();
        let correlator = correlator(&port);

        let task = {
            let correlator = correlator.clone();
            tokio::spawn(async move { correlator.query().await })
        };
        wait_for_in_flight(&correlator).await;

        assert!(!correlator.handle_line("AT+CSQ"));
        assert!(correlator.handle_line("+CSQ: 17,99"));

        let sample = task.await.unwrap().unwrap();
        assert_eq!(sample.as_str(), "17,99");
        assert_eq!(port.get_written_data(), vec![b"AT+CSQ\r\n".to_vec()]);
        assert_eq!(correlator.in_flight(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_times_out_without_response() {
        let port = MockSerialPort::new();
        let correlator = correlator(&port);

        let result = correlator.query().await;

        assert!(matches!(result, Err(SurveyError::QueryTimeout(d)) if d == DEFAULT_QUERY_TIMEOUT));
        assert_eq!(correlator.in_flight(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_is_not_reused() {
        let port = MockSerialPort::new();
        let correlator = correlator(&port);

        assert!(correlator.query().await.is_err());

        // The answer to the timed-out query shows up now
        assert!(!correlator.handle_line("+CSQ: 5,99"));

        let task = {
            let correlator = correlator.clone();
            tokio::spawn(async move { correlator.query().await })
        };
        wait_for_in_flight(&correlator).await;
        correlator.handle_line("+CSQ: 22,99");

        assert_eq!(task.await.unwrap().unwrap().as_str(), "22,99");
    }

    #[tokio::test]
    async fn test_unsolicited_response_is_dropped() {
        let port = MockSerialPort::new();
        let correlator = correlator(&port);
        assert!(!correlator.handle_line("+CSQ: 9,99"));
        assert_eq!(correlator.in_flight(), None);
    }

    #[tokio::test]
    async fn test_tokens_increase_per_query() {
        let port = MockSerialPort::new();
        let correlator = correlator(&port);
        let mut tokens = Vec::new();

        for value in ["1,99", "2,99"] {
            let task = {
                let correlator = correlator.clone();
                tokio::spawn(async move { correlator.query().await })
            };
            tokens.push(wait_for_in_flight(&correlator).await);
            correlator.handle_line(&format!("+CSQ: {}", value));
            assert_eq!(task.await.unwrap().unwrap().as_str(), value);
        }

        assert!(tokens[1] > tokens[0]);
    }

    #[tokio::test]
    async fn test_write_error_clears_in_flight() {
        let port = MockSerialPort::new();
        port.set_write_error(io::ErrorKind::BrokenPipe);
        let correlator = correlator(&port);

        let result = correlator.query().await;

        assert!(matches!(result, Err(SurveyError::Serial(_))));
        assert_eq!(correlator.in_flight(), None);
    }

    #[tokio::test]
    async fn test_flush_error_is_reported() {
        let port = MockSerialPort::new();
        port.set_flush_error(io::ErrorKind::TimedOut);
        let correlator = correlator(&port);

        match correlator.query().await {
            Err(SurveyError::Serial(msg)) => assert!(msg.contains("AT+CSQ")),
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_custom_protocol() {
        let port = MockSerialPort::new();
        let correlator = Arc::new(ModemCorrelator::with_protocol(
            Box::new(port.clone()),
            DEFAULT_QUERY_TIMEOUT,
            "AT+CESQ",
            "+CESQ: ",
        ));

        let task = {
            let correlator = correlator.clone();
            tokio::spawn(async move { correlator.query().await })
        };
        wait_for_in_flight(&correlator).await;
        correlator.handle_line("+CESQ: 99,99,255,255,20,50");

        assert_eq!(task.await.unwrap().unwrap().as_str(), "99,99,255,255,20,50");
        assert_eq!(port.get_written_data(), vec![b"AT+CESQ\r\n".to_vec()]);
    }
}
