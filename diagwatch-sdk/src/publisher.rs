//! A publisher that records diagnostics for everything it sends.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::Clock;
use crate::config::{FrequencyConfig, TimestampConfig};
use crate::error::{DiagnosticError, Result};
use crate::task::Reporter;
use crate::topic::TopicDiagnostic;

/// Event time carried in a message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stamp {
    pub sec: i64,
    pub nanosec: u32,
}

impl Stamp {
    pub fn new(sec: i64, nanosec: u32) -> Self {
        Self { sec, nanosec }
    }

    /// Split fractional seconds into a stamp.
    pub fn from_secs_f64(seconds: f64) -> Self {
        let sec = seconds.floor();
        let nanosec = ((seconds - sec) * 1e9).round().min(999_999_999.0) as u32;
        Self {
            sec: sec as i64,
            nanosec,
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.nanosec as f64 / 1e9
    }
}

/// Standard message header.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Stamp,
    #[serde(default)]
    pub frame_id: String,
}

/// Messages that carry a header stamp.
pub trait Stamped {
    /// The `header.stamp` of this message, if it has one.
    fn header_stamp(&self) -> Option<Stamp>;
}

impl Stamped for Header {
    fn header_stamp(&self) -> Option<Stamp> {
        Some(self.stamp)
    }
}

/// Dynamic messages are expected to look like
/// `{"header": {"stamp": {"sec": .., "nanosec": ..}}, ...}`.
impl Stamped for Value {
    fn header_stamp(&self) -> Option<Stamp> {
        let stamp = self.get("header")?.get("stamp")?;
        let sec = stamp.get("sec")?.as_i64()?;
        let nanosec = u32::try_from(stamp.get("nanosec")?.as_u64()?).ok()?;
        Some(Stamp { sec, nanosec })
    }
}

/// Where a [`DiagnosedPublisher`] sends its messages.
pub trait PublishChannel {
    type Message;

    /// Name of the topic this channel publishes on.
    fn topic_name(&self) -> &str;

    fn send(&self, message: Self::Message) -> Result<()>;
}

/// A [`PublishChannel`] over a tokio mpsc sender.
///
/// Sends never wait; a full or closed channel is a publish error.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct ChannelPublisher<M> {
    topic: String,
    tx: tokio::sync::mpsc::Sender<M>,
}

#[cfg(feature = "tokio")]
impl<M> ChannelPublisher<M> {
    /// Create a publisher and the receiver its messages arrive on.
    pub fn create(topic: &str, buffer: usize) -> (Self, tokio::sync::mpsc::Receiver<M>) {
        let (tx, rx) = tokio::sync::mpsc::channel(buffer);
        (
            Self {
                topic: topic.to_string(),
                tx,
            },
            rx,
        )
    }
}

#[cfg(feature = "tokio")]
impl<M> PublishChannel for ChannelPublisher<M> {
    type Message = M;

    fn topic_name(&self) -> &str {
        &self.topic
    }

    fn send(&self, message: M) -> Result<()> {
        self.tx
            .try_send(message)
            .map_err(|e| DiagnosticError::Publish(format!("{}: {}", self.topic, e)))
    }
}

/// A publish channel paired with a [`TopicDiagnostic`] for its topic.
///
/// Every [`publish`](DiagnosedPublisher::publish) reads the event time from
/// the message header, feeds both monitors, then forwards the message
/// unchanged.
///
/// # Example
///
/// ```rust
/// use diagwatch_sdk::{
///     ChannelPublisher, DiagnosedPublisher, FrequencyConfig, TimestampConfig, Updater,
/// };
/// use serde_json::json;
///
/// let updater = Updater::new();
/// let (channel, mut rx) = ChannelPublisher::create("/camera/image", 8);
/// let publisher = DiagnosedPublisher::new(
///     channel,
///     FrequencyConfig::new(25.0, 35.0),
///     TimestampConfig::new(0.0, 0.5),
/// )?;
/// publisher.attach(&updater)?;
///
/// publisher.publish(json!({"header": {"stamp": {"sec": 1700000000, "nanosec": 0}}}))?;
/// assert!(rx.try_recv().is_ok());
/// # Ok::<(), diagwatch_sdk::DiagnosticError>(())
/// ```
pub struct DiagnosedPublisher<C> {
    channel: C,
    diagnostic: Arc<TopicDiagnostic>,
}

impl<C: PublishChannel> DiagnosedPublisher<C> {
    pub fn new(channel: C, frequency: FrequencyConfig, timestamp: TimestampConfig) -> Result<Self> {
        let diagnostic = TopicDiagnostic::new(channel.topic_name(), frequency, timestamp)?;
        Ok(Self::from_parts(channel, diagnostic))
    }

    /// Like [`new`](Self::new), with an explicit clock for both monitors.
    pub fn with_clock(
        channel: C,
        frequency: FrequencyConfig,
        timestamp: TimestampConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let diagnostic = TopicDiagnostic::builder(channel.topic_name())
            .frequency(frequency)
            .timestamp(timestamp)
            .clock(clock)
            .build()?;
        Ok(Self::from_parts(channel, diagnostic))
    }

    fn from_parts(channel: C, diagnostic: TopicDiagnostic) -> Self {
        Self {
            channel,
            diagnostic: Arc::new(diagnostic),
        }
    }

    /// Register the topic diagnostic with a reporter.
    pub fn attach<R>(&self, reporter: &R) -> Result<()>
    where
        R: Reporter + ?Sized,
    {
        self.diagnostic.attach(reporter)
    }

    /// Record statistics for `message`, then send it.
    ///
    /// A message without a header stamp is a caller bug: it fails with
    /// [`DiagnosticError::MissingTimestampField`], records nothing and is
    /// not sent.
    pub fn publish(&self, message: C::Message) -> Result<()>
    where
        C::Message: Stamped,
    {
        let stamp = message
            .header_stamp()
            .ok_or(DiagnosticError::MissingTimestampField)?;
        self.diagnostic.tick_stamp(stamp.as_secs_f64());
        self.channel.send(message)
    }

    pub fn topic(&self) -> &str {
        self.channel.topic_name()
    }

    pub fn diagnostic(&self) -> &Arc<TopicDiagnostic> {
        &self.diagnostic
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}

impl<C: PublishChannel> std::fmt::Debug for DiagnosedPublisher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagnosedPublisher")
            .field("topic", &self.topic())
            .field("diagnostic", &self.diagnostic)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::task::DiagnosticTask;
    use diagwatch_types::Level;
    use parking_lot::Mutex;
    use serde_json::json;

    const NOW: f64 = 1_700_000_000.0;

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<Value>>,
        reject: bool,
    }

    impl PublishChannel for RecordingChannel {
        type Message = Value;

        fn topic_name(&self) -> &str {
            "/camera/image"
        }

        fn send(&self, message: Value) -> Result<()> {
            if self.reject {
                return Err(DiagnosticError::Publish("closed".to_string()));
            }
            self.sent.lock().push(message);
            Ok(())
        }
    }

    fn publisher(channel: RecordingChannel) -> (DiagnosedPublisher<RecordingChannel>, ManualClock) {
        let clock = ManualClock::new(NOW);
        let publisher = DiagnosedPublisher::with_clock(
            channel,
            FrequencyConfig::new(10.0, 20.0),
            TimestampConfig::new(0.0, 0.5),
            Arc::new(clock.clone()),
        )
        .unwrap();
        (publisher, clock)
    }

    fn message(seconds: f64) -> Value {
        let stamp = Stamp::from_secs_f64(seconds);
        json!({
            "header": {"stamp": {"sec": stamp.sec, "nanosec": stamp.nanosec}, "frame_id": "cam"},
            "data": [1, 2, 3],
        })
    }

    #[test]
    fn topic_name_comes_from_channel() {
        let (publisher, _) = publisher(RecordingChannel::default());
        assert_eq!(publisher.topic(), "/camera/image");
        assert_eq!(publisher.diagnostic().name(), "/camera/image topic status");
    }

    #[test]
    fn publish_records_and_forwards_unchanged() {
        let (publisher, clock) = publisher(RecordingChannel::default());
        let sent = message(NOW - 0.1);

        publisher.publish(sent.clone()).unwrap();

        assert_eq!(publisher.channel().sent.lock().as_slice(), &[sent]);
        let diagnostic = publisher.diagnostic();
        assert_eq!(diagnostic.frequency().tick_count(), 1);

        clock.advance(0.05);
        let stamps = diagnostic.timestamp().unwrap().evaluate();
        assert_eq!(stamps.level, Level::Ok);
        let delay: f64 = stamps.value("Average timestamp delay").unwrap().parse().unwrap();
        assert!((delay - 0.1).abs() < 1e-6);
    }

    #[test]
    fn missing_stamp_fails_without_send() {
        let (publisher, _) = publisher(RecordingChannel::default());

        let err = publisher.publish(json!({"data": [1, 2, 3]})).unwrap_err();
        assert!(matches!(err, DiagnosticError::MissingTimestampField));

        let err = publisher
            .publish(json!({"header": {"frame_id": "cam"}}))
            .unwrap_err();
        assert!(matches!(err, DiagnosticError::MissingTimestampField));

        assert!(publisher.channel().sent.lock().is_empty());
        assert_eq!(publisher.diagnostic().frequency().tick_count(), 0);
    }

    #[test]
    fn channel_failure_propagates() {
        let (publisher, _) = publisher(RecordingChannel {
            reject: true,
            ..Default::default()
        });

        let err = publisher.publish(message(NOW)).unwrap_err();
        assert!(matches!(err, DiagnosticError::Publish(_)));
    }

    #[test]
    fn stamp_conversions() {
        let stamp = Stamp::new(12, 500_000_000);
        assert_eq!(stamp.as_secs_f64(), 12.5);
        assert_eq!(Stamp::from_secs_f64(12.5), stamp);
        assert_eq!(Header { stamp, ..Default::default() }.header_stamp(), Some(stamp));
    }

    #[test]
    fn json_stamp_requires_both_fields() {
        let value = json!({"header": {"stamp": {"sec": 5}}});
        assert_eq!(value.header_stamp(), None);

        let value = json!({"header": {"stamp": {"sec": 5, "nanosec": 7}}});
        assert_eq!(value.header_stamp(), Some(Stamp::new(5, 7)));
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn channel_publisher_delivers() {
        let (channel, mut rx) = ChannelPublisher::create("/odom", 4);
        let publisher = DiagnosedPublisher::new(
            channel,
            FrequencyConfig::default(),
            TimestampConfig::default(),
        )
        .unwrap();

        publisher.publish(message(NOW)).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received["data"], json!([1, 2, 3]));
    }

    #[cfg(feature = "tokio")]
    #[test]
    fn closed_channel_is_publish_error() {
        let (channel, rx) = ChannelPublisher::<Value>::create("/odom", 1);
        drop(rx);
        let err = channel.send(json!({})).unwrap_err();
        assert!(matches!(err, DiagnosticError::Publish(_)));
    }
}
