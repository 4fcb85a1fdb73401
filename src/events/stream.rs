//! Event stream reader
//!
//! Reads concatenated JSON watch events (pretty-printed or one per line)
//! from any reader and feeds the translated entities into a pending batch.

use crate::batch::PendingBatch;
use crate::error::EventError;
use crate::events::pod::{translate, WatchEvent};

use serde_json::{Deserializer, Value};
use std::io::Read;

/// Counters for one forwarded stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Events decoded
    pub events: usize,
    /// Values that were valid JSON but not watch events
    pub malformed: usize,
    /// Entities appended to the batch
    pub entities: usize,
}

/// Iterator over watch events in a JSON stream
///
/// Values that are not watch events are yielded as errors and the stream
/// continues; a syntax or read error ends it.
pub struct EventStream<R: Read> {
    values: serde_json::StreamDeserializer<'static, serde_json::de::IoRead<R>, Value>,
    done: bool,
}

impl<R: Read> EventStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            values: Deserializer::from_reader(reader).into_iter::<Value>(),
            done: false,
        }
    }
}

/// One item of an event stream
#[derive(Debug)]
pub enum StreamItem {
    Event(WatchEvent),
    Malformed(serde_json::Error),
}

impl<R: Read> Iterator for EventStream<R> {
    type Item = Result<StreamItem, EventError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.values.next()? {
            Ok(value) => Some(Ok(match serde_json::from_value::<WatchEvent>(value) {
                Ok(event) => StreamItem::Event(event),
                Err(e) => StreamItem::Malformed(e),
            })),
            Err(e) => {
                self.done = true;
                Some(Err(if e.is_io() {
                    EventError::Io(e.into())
                } else {
                    EventError::Malformed(e)
                }))
            }
        }
    }
}

/// Forward every event of `reader` into `batch` until end of stream
pub fn forward_events<R: Read>(reader: R, batch: &PendingBatch) -> Result<StreamStats, EventError> {
    let mut stats = StreamStats::default();

    for item in EventStream::new(reader) {
        match item? {
            StreamItem::Event(event) => {
                stats.events += 1;
                let entities = translate(&event);
                if entities.is_empty() {
                    continue;
                }
                log::debug!(
                    "{} {}/{}: {} entities",
                    event.event_type,
                    event.object.metadata.namespace,
                    event.object.metadata.name,
                    entities.len()
                );
                stats.entities += entities.len();
                batch.append(entities);
            }
            StreamItem::Malformed(e) => {
                stats.malformed += 1;
                log::warn!("Skipping malformed event: {}", e);
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::TriggerConfig;
    use crate::domain::EntityDescriptor;

    const STREAM: &str = r#"
{
    "type": "ADDED",
    "object": {
        "metadata": {"name": "pod1", "namespace": "ns1"},
        "spec": {"containers": [{"name": "c1", "resources": {"requests": {"cpu": "500m"}}}]}
    }
}
{"type": "MODIFIED", "object": {"metadata": {"name": "pod1", "namespace": "ns1"}}}
{"kind": "Pod"}
{"type": "DELETED", "object": {"metadata": {"name": "pod1", "namespace": "ns1"}}}
"#;

    #[test]
    fn test_forward_events() {
        let batch = PendingBatch::new(TriggerConfig::default());
        let stats = forward_events(STREAM.as_bytes(), &batch).unwrap();

        assert_eq!(
            stats,
            StreamStats {
                events: 3,
                malformed: 1,
                entities: 2,
            }
        );
        assert_eq!(
            batch.drain_all(),
            vec![
                EntityDescriptor::added("ns1", "pod1", "c1", "0.5"),
                EntityDescriptor::removed("ns1", "pod1"),
            ]
        );
    }

    #[test]
    fn test_syntax_error_ends_stream() {
        let batch = PendingBatch::new(TriggerConfig::default());
        let input = r#"{"type": "DELETED", "object": {"metadata": {"name": "p", "namespace": "n"}}} {"type": "#;
        let result = forward_events(input.as_bytes(), &batch);

        assert!(matches!(result, Err(EventError::Malformed(_))));
        // Events before the error were still forwarded
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_empty_stream() {
        let batch = PendingBatch::new(TriggerConfig::default());
        let stats = forward_events(&b""[..], &batch).unwrap();
        assert_eq!(stats, StreamStats::default());
    }
}
