//! `tracing_subscriber` layer that forwards every log event to the TUI so the
//! status line can show the latest log line while a request is running.
//!
//! Only `on_event()` is implemented; spans are ignored.

use std::fmt::Write as _;

use tokio::sync::mpsc::UnboundedSender;
use tracing::Event;
use tracing::Subscriber;
use tracing::field::Field;
use tracing::field::Visit;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

pub struct TuiLogLayer {
    tx: UnboundedSender<String>,
    max_len: usize,
}

impl TuiLogLayer {
    pub fn new(tx: UnboundedSender<String>, max_len: usize) -> Self {
        Self {
            tx,
            max_len: max_len.max(8),
        }
    }
}

impl<S> Layer<S> for TuiLogLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let _ = self.tx.send(format_event(event, self.max_len));
    }
}

struct Visitor<'a> {
    buf: &'a mut String,
}

impl Visit for Visitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            let _ = write!(self.buf, " {value}");
        } else {
            let _ = write!(self.buf, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.buf, " {value:?}");
        } else {
            let _ = write!(self.buf, " {}={value:?}", field.name());
        }
    }
}

/// `[LEVEL target] message key=value…` on a single line of at most `max_len`
/// bytes.
fn format_event(event: &Event<'_>, max_len: usize) -> String {
    let mut buf = String::new();
    let _ = write!(
        buf,
        "[{} {}]",
        event.metadata().level(),
        event.metadata().target()
    );
    event.record(&mut Visitor { buf: &mut buf });
    truncate_at_char_boundary(&mut buf, max_len);
    buf.replace(['\n', '\r'], " ")
}

/// `String::truncate` panics off a char boundary, so cut at the next one.
fn truncate_at_char_boundary(buf: &mut String, max_len: usize) {
    if buf.len() <= max_len {
        return;
    }
    let mut idx = max_len;
    while idx < buf.len() && !buf.is_char_boundary(idx) {
        idx += 1;
    }
    buf.truncate(idx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn truncation_respects_multibyte_characters() {
        let mut s = "abcé".to_string();
        truncate_at_char_boundary(&mut s, 4);
        assert_eq!(s, "abcé");

        let mut s = "abcdef".to_string();
        truncate_at_char_boundary(&mut s, 3);
        assert_eq!(s, "abc");
    }

    #[test]
    fn forwards_events_to_the_channel() {
        use tracing_subscriber::prelude::*;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let subscriber = tracing_subscriber::registry().with(TuiLogLayer::new(tx, 120));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(pending_id = "p1", "resolving\nbatch");
        });

        let line = rx.try_recv().unwrap();
        assert!(line.starts_with("[INFO "), "line: {line}");
        assert!(line.ends_with("resolving batch pending_id=p1"), "line: {line}");
    }
}
