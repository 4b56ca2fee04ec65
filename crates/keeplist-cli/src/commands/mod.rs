//! Command handlers grouped by concern.

pub(crate) mod checklists;
pub(crate) mod items;
pub(crate) mod session;
