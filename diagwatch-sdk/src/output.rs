//! Output backends for emitting reports.

use std::path::PathBuf;

use diagwatch_types::Report;

/// Output destination for reports.
///
/// Configure where the updater should send each cycle's report.
#[derive(Debug)]
pub enum Output {
    /// Write reports to a JSON file.
    ///
    /// The file is overwritten with each report.
    File(PathBuf),

    /// Send reports through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    #[cfg(feature = "tokio")]
    Channel(tokio::sync::mpsc::Sender<Report>),
}

impl Output {
    /// Create a file output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use diagwatch_sdk::Output;
    ///
    /// let output = Output::file("diagnostics.json");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// This is the hook for forwarding reports to your own transport.
    ///
    /// # Example
    ///
    /// ```rust
    /// use diagwatch_sdk::Output;
    ///
    /// let (output, mut rx) = Output::channel(16);
    ///
    /// // Later, receive reports
    /// // while let Some(report) = rx.recv().await {
    /// //     println!("worst level: {}", report.worst_level());
    /// // }
    /// ```
    #[cfg(feature = "tokio")]
    pub fn channel(buffer: usize) -> (Self, tokio::sync::mpsc::Receiver<Report>) {
        let (tx, rx) = tokio::sync::mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Emit a report to this output.
    #[cfg(feature = "tokio")]
    pub(crate) async fn emit(&self, report: &Report) -> std::io::Result<()> {
        match self {
            Output::File(path) => {
                let json = serde_json::to_string_pretty(report)?;
                tokio::fs::write(path, json).await?;
            }
            Output::Channel(tx) => {
                // Don't block the cycle if the consumer is behind
                let _ = tx.try_send(report.clone());
            }
        }
        Ok(())
    }
}
