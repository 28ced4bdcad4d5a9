//! Command handlers grouped by concern.

pub(crate) mod logs;
pub(crate) mod probe;
pub(crate) mod walk;
