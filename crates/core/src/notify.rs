//! UI notification boundary
//!
//! The session layer never touches presentation state. It reports progress,
//! status and results through [`UiNotifier`], and it never does so while
//! holding the transport lock.

use crate::key::KeyRef;
use crate::value::Value;

/// Receiver of progress, status and results
pub trait UiNotifier: Send + Sync {
    /// Fraction of the current listing done, in `0.0..=1.0`
    fn report_progress(&self, fraction: f64);

    /// One-line status text
    fn report_status(&self, message: &str);

    /// Fresh children of `parent`
    fn report_children(&self, parent: &KeyRef, children: &[KeyRef]);

    /// Fresh values of the key last reported via `report_children`
    fn report_values(&self, values: &[Value]);

    /// User-visible failure
    fn report_error(&self, message: &str);

    /// Search found `key` (or `value` within it)
    fn report_search_hit(&self, key: &KeyRef, value: Option<&Value>);

    /// Search exhausted the tree
    fn report_search_miss(&self);
}

/// Notifier that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl UiNotifier for NullNotifier {
    fn report_progress(&self, _fraction: f64) {}
    fn report_status(&self, _message: &str) {}
    fn report_children(&self, _parent: &KeyRef, _children: &[KeyRef]) {}
    fn report_values(&self, _values: &[Value]) {}
    fn report_error(&self, _message: &str) {}
    fn report_search_hit(&self, _key: &KeyRef, _value: Option<&Value>) {}
    fn report_search_miss(&self) {}
}
