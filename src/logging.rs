use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::LoggingConfig;
use crate::error::Result;
use crate::payload::{InboundEvent, ParsedPayload};

const MAX_SINK_MEMORY_BYTES: usize = 2 * 1024 * 1024; // 2MB
const SEPARATOR: &str = "==================================================";

/// Destination for the diagnostic record of each received webhook
pub trait EventSink: Send + Sync {
    fn record(&self, event: &InboundEvent, payload: &ParsedPayload);
}

/// Writes received webhooks to the tracing subscriber
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &InboundEvent, payload: &ParsedPayload) {
        info!("{}", SEPARATOR);
        info!("[{}] Webhook received at: {}", event.id, event.timestamp());
        info!(
            "Client IP: {}",
            event.client_ip.as_deref().unwrap_or("unknown")
        );
        info!("Method: {}", event.method);
        info!("URL: {}", event.url);

        info!("Headers:");
        for (name, value) in &event.headers {
            info!("  {}: {}", name, value);
        }

        match payload {
            ParsedPayload::Structured(value) => {
                info!("JSON data:");
                match serde_json::to_string_pretty(value) {
                    Ok(pretty) => info!("{}", pretty),
                    Err(_) => info!("{}", value),
                }
            }
            ParsedPayload::RawText(text) => {
                info!("Raw data:");
                info!("{}", text);
            }
            ParsedPayload::Unparseable { text, error } => {
                error!("Payload parse error: {}", error);
                info!("Raw data: {}", text);
            }
        }
        info!("{}", SEPARATOR);
    }
}

/// One webhook as kept by [`MemorySink`]
#[derive(Clone, Debug)]
pub struct SinkEntry {
    pub event_id: String,
    pub received_at: DateTime<Local>,
    pub method: String,
    pub url: String,
    pub payload: ParsedPayload,
}

impl SinkEntry {
    fn size(&self) -> usize {
        let payload_len = match &self.payload {
            ParsedPayload::Structured(value) => value.to_string().len(),
            ParsedPayload::RawText(text) => text.len(),
            ParsedPayload::Unparseable { text, error } => text.len() + error.len(),
        };
        std::mem::size_of::<SinkEntry>() + self.url.len() + payload_len
    }
}

/// Keeps the most recent webhooks in memory, oldest evicted first once the
/// byte budget is exceeded
pub struct MemorySink {
    entries: Mutex<VecDeque<SinkEntry>>,
    max_total_memory_size: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::with_max_memory(MAX_SINK_MEMORY_BYTES)
    }

    pub fn with_max_memory(max_total_memory_size: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            max_total_memory_size,
        }
    }

    pub fn entries(&self) -> Vec<SinkEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &InboundEvent, payload: &ParsedPayload) {
        let entry = SinkEntry {
            event_id: event.id.to_string(),
            received_at: event.received_at,
            method: event.method.clone(),
            url: event.url.clone(),
            payload: payload.clone(),
        };
        let entry_size = entry.size();
        debug!("Entry Size: {}", entry_size);

        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        let mut total: usize = entries.iter().map(SinkEntry::size).sum();
        while total + entry_size > self.max_total_memory_size {
            match entries.pop_front() {
                Some(evicted) => total -= evicted.size(),
                None => break,
            }
        }
        entries.push_back(entry);
    }
}

/// Daily rotating log files, written without blocking the request path
pub struct FileLogger {
    log_directory: PathBuf,
    rotation: Rotation,
}

impl FileLogger {
    pub fn new(log_directory: PathBuf) -> Self {
        Self {
            log_directory,
            rotation: Rotation::DAILY,
        }
    }

    pub fn setup_file_logging(&self) -> Result<(NonBlocking, WorkerGuard)> {
        std::fs::create_dir_all(&self.log_directory)?;

        let file_appender = RollingFileAppender::new(
            self.rotation.to_owned(),
            &self.log_directory,
            "webhooker",
        );

        Ok(tracing_appender::non_blocking(file_appender))
    }
}

/// Install the global subscriber: console output plus optional log files.
/// `RUST_LOG` overrides the configured level. The returned guard must be kept
/// alive for file output to be flushed.
pub fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            let (writer, guard) = FileLogger::new(dir.clone()).setup_file_logging()?;
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer()) // Console output
        .with(file_layer)
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::Request;

    fn event(url: &str) -> InboundEvent {
        let (parts, _) = Request::builder()
            .method("POST")
            .uri(url)
            .body(())
            .unwrap()
            .into_parts();
        InboundEvent::from_parts(&parts, Bytes::new(), None)
    }

    #[test]
    fn memory_sink_keeps_entries_in_order() {
        let sink = MemorySink::new();
        sink.record(&event("/webhook?n=1"), &ParsedPayload::RawText("one".into()));
        sink.record(&event("/webhook?n=2"), &ParsedPayload::RawText("two".into()));

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].url, "/webhook?n=1");
        assert_eq!(entries[1].url, "/webhook?n=2");
        assert_eq!(entries[1].method, "POST");
    }

    #[test]
    fn memory_sink_evicts_oldest_when_over_budget() {
        let entry_size = std::mem::size_of::<SinkEntry>() + "/webhook".len() + 100;
        let sink = MemorySink::with_max_memory(entry_size * 2);
        let text = "x".repeat(100);

        for _ in 0..5 {
            sink.record(&event("/webhook"), &ParsedPayload::RawText(text.clone()));
        }

        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn memory_sink_keeps_single_oversized_entry() {
        let sink = MemorySink::with_max_memory(16);
        sink.record(&event("/webhook"), &ParsedPayload::RawText("big".repeat(50)));
        assert_eq!(sink.len(), 1);
        assert!(!sink.is_empty());
    }
}
