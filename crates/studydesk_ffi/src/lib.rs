//! Flutter bridge over the StudyDesk core.

pub mod api;
