//! Transient user-facing alerts.
//!
//! Components never surface errors by returning them past their boundary;
//! they log and emit a [`Toast`] instead. The UI drains the receiver.

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ToastSink {
    tx: mpsc::UnboundedSender<Toast>,
}

impl ToastSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Toast>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, toast: Toast) {
        if self.tx.send(toast).is_err() {
            tracing::debug!("Toast dropped, no UI is listening");
        }
    }

    pub fn info(&self, title: impl Into<String>, description: impl Into<String>) {
        self.emit(Toast {
            kind: ToastKind::Info,
            title: title.into(),
            description: description.into(),
        });
    }

    pub fn error(&self, title: impl Into<String>, error: &dyn std::fmt::Display) {
        self.emit(Toast {
            kind: ToastKind::Error,
            title: title.into(),
            description: error.to_string(),
        });
    }
}

/// Shorten `text` to at most `max` characters for alert previews.
pub fn preview(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
