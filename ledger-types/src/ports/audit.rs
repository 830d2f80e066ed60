//! Audit emitter port.

use crate::domain::AuditEvent;

/// Sink for audit events.
///
/// `emit` is fire-and-forget: it must return promptly and never surface a
/// delivery failure to the caller. Implementations may queue and retry.
pub trait AuditEmitter: Send + Sync {
    fn emit(&self, event: AuditEvent);
}
