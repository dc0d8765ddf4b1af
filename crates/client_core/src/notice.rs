//! User-facing notifications produced by workflow transitions.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Pending notices, drained by the presentation layer.
#[derive(Debug, Default)]
pub(crate) struct NoticeQueue {
    pending: Vec<Notice>,
}

impl NoticeQueue {
    pub(crate) fn push(&mut self, notice: Notice) {
        self.pending.push(notice);
    }

    pub(crate) fn take(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.pending)
    }
}
