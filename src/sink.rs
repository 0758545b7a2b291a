// src/sink.rs - publish targets for serialized records
use crate::error::SinkError;
use std::io::Write;
use tracing::{debug, warn};

/// Acknowledgment for a message previously accepted by [`Sink::send`]
#[derive(Debug)]
pub enum DeliveryReport {
    Delivered {
        topic: String,
        key: String,
        payload: Vec<u8>,
    },
    Failed {
        topic: String,
        key: String,
        error: SinkError,
    },
}

pub type DeliveryCallback = Box<dyn FnMut(&DeliveryReport)>;

/// Logs every acknowledgment; used when no callback is installed.
pub fn log_delivery(report: &DeliveryReport) {
    match report {
        DeliveryReport::Delivered { payload, .. } => {
            debug!(
                "sink: received callback, message={}",
                String::from_utf8_lossy(payload)
            )
        }
        DeliveryReport::Failed { topic, key, error } => {
            warn!(
                "sink: received error callback, topic={}, key={}, error={}",
                topic, key, error
            )
        }
    }
}

/// Destination for published records.
///
/// `send` only reports errors detected locally; delivery outcomes arrive
/// later through the sink's delivery callback, at the latest during
/// `flush`, which blocks until every accepted message is resolved.
pub trait Sink {
    fn send(&mut self, topic: &str, key: &str, payload: &[u8]) -> Result<(), SinkError>;
    fn flush(&mut self) -> Result<(), SinkError>;
    fn close(&mut self) -> Result<(), SinkError>;

    /// Number of accepted messages reported as failed so far.
    fn undelivered(&self) -> usize {
        0
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn send(&mut self, topic: &str, key: &str, payload: &[u8]) -> Result<(), SinkError> {
        (**self).send(topic, key, payload)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<(), SinkError> {
        (**self).close()
    }

    fn undelivered(&self) -> usize {
        (**self).undelivered()
    }
}

struct Pending {
    topic: String,
    key: String,
    payload: Vec<u8>,
}

/// Publishes each payload as one line on a writer (JSON Lines).
///
/// Messages are acknowledged once the writer has been flushed, which
/// happens every `max_pending` sends and on [`Sink::flush`].
pub struct WriterSink<W: Write> {
    writer: W,
    pending: Vec<Pending>,
    max_pending: usize,
    on_delivery: DeliveryCallback,
    undelivered: usize,
    closed: bool,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink {
            writer,
            pending: Vec::new(),
            max_pending: 1000,
            on_delivery: Box::new(log_delivery),
            undelivered: 0,
            closed: false,
        }
    }

    pub fn with_delivery_callback(mut self, callback: DeliveryCallback) -> Self {
        self.on_delivery = callback;
        self
    }

    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(1);
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn resolve_pending(&mut self, result: &std::io::Result<()>) {
        for message in self.pending.drain(..) {
            let report = match result {
                Ok(()) => DeliveryReport::Delivered {
                    topic: message.topic,
                    key: message.key,
                    payload: message.payload,
                },
                Err(e) => {
                    self.undelivered += 1;
                    DeliveryReport::Failed {
                        topic: message.topic,
                        key: message.key,
                        error: SinkError::Delivery(e.to_string()),
                    }
                }
            };
            (self.on_delivery)(&report);
        }
    }
}

impl<W: Write> Sink for WriterSink<W> {
    fn send(&mut self, topic: &str, key: &str, payload: &[u8]) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        if self.pending.len() >= self.max_pending {
            self.flush()?;
        }

        self.writer.write_all(payload)?;
        self.writer.write_all(b"\n")?;
        self.pending.push(Pending {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let result = self.writer.flush();
        self.resolve_pending(&result);
        Ok(result?)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.pending.is_empty() {
            Ok(())
        } else {
            self.flush()
        }
    }

    fn undelivered(&self) -> usize {
        self.undelivered
    }
}

/// Exclusive owner of a sink for the duration of a run.
///
/// The sink is flushed and then closed exactly once: by [`SinkHandle::finish`]
/// or, if that is never reached, when the handle is dropped.
pub struct SinkHandle<S: Sink> {
    sink: S,
    finished: bool,
}

impl<S: Sink> SinkHandle<S> {
    pub fn new(sink: S) -> Self {
        SinkHandle {
            sink,
            finished: false,
        }
    }

    /// Hand a payload to the sink; an error means it was not accepted.
    pub fn publish(&mut self, topic: &str, key: &str, payload: &[u8]) -> Result<(), SinkError> {
        self.sink.send(topic, key, payload)
    }

    pub fn finish(&mut self) -> Result<(), SinkError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let flushed = self.sink.flush();
        let closed = self.sink.close();
        flushed.and(closed)
    }

    pub fn undelivered(&self) -> usize {
        self.sink.undelivered()
    }
}

impl<S: Sink> Drop for SinkHandle<S> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!("sink: failed to flush on shutdown: {}", e);
        }
    }
}
