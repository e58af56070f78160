//! Reporting of faults raised inside the background sweep.

use std::any::Any;
use std::fmt;

/// A fault caught while a sweep was scanning the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFault {
    message: String,
}

impl SweepFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Builds a fault from the payload of a caught panic.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "sweep panicked with a non-string payload".to_string()
        };
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for SweepFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sweep fault: {}", self.message)
    }
}

/// Receives faults from the sweep. Implementations must not panic.
pub trait FaultSink: Send + Sync {
    fn report(&self, fault: &SweepFault);
}

/// Default sink: logs the fault and lets the next sweep carry on.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFaultSink;

impl FaultSink for TracingFaultSink {
    fn report(&self, fault: &SweepFault) {
        tracing::error!(fault = %fault.message(), "decaying cache sweep failed");
    }
}

impl<F> FaultSink for F
where
    F: Fn(&SweepFault) + Send + Sync,
{
    fn report(&self, fault: &SweepFault) {
        self(fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_from_str_panic() {
        let payload = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(SweepFault::from_panic(payload).message(), "boom");
    }

    #[test]
    fn test_fault_from_formatted_panic() {
        let payload = std::panic::catch_unwind(|| panic!("bad key {}", 7)).unwrap_err();
        assert_eq!(SweepFault::from_panic(payload).message(), "bad key 7");
    }

    #[test]
    fn test_closure_sink() {
        use std::sync::Mutex;

        let seen = Mutex::new(Vec::new());
        let sink = |fault: &SweepFault| seen.lock().unwrap().push(fault.message().to_string());
        sink.report(&SweepFault::new("first"));

        assert_eq!(*seen.lock().unwrap(), vec!["first".to_string()]);
    }
}
