//! Explicit degraded-path result type for capability-calling functions.
//!
//! Every function that calls the external inference capability returns an
//! [`Outcome`] instead of swallowing errors into defaults inside a catch
//! block. The caller decides whether `Degraded` is acceptable (in this
//! pipeline it always is), which makes the fallback path a first-class,
//! testable branch.

/// Result of a call that can fall back to a safe default.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The capability produced a usable value.
    Ok(T),
    /// The capability failed; the reason is preserved for logging.
    Degraded(String),
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_))
    }

    /// The degradation reason, if any.
    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Degraded(reason) => Some(reason),
        }
    }

    /// Resolve with a fallback computed from the degradation reason.
    pub fn unwrap_or_else_degraded(self, fallback: impl FnOnce(&str) -> T) -> T {
        match self {
            Outcome::Ok(value) => value,
            Outcome::Degraded(reason) => fallback(&reason),
        }
    }

    /// Map the success value, keeping degradation untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Degraded(reason) => Outcome::Degraded(reason),
        }
    }
}

impl<T> From<crate::error::Result<T>> for Outcome<T> {
    fn from(result: crate::error::Result<T>) -> Self {
        match result {
            Ok(value) => Outcome::Ok(value),
            Err(e) => Outcome::Degraded(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_ok() {
        let outcome: Outcome<i32> = Outcome::Ok(42);
        assert!(outcome.is_ok());
        assert!(!outcome.is_degraded());
        assert_eq!(outcome.degraded_reason(), None);
        assert_eq!(outcome.unwrap_or_else_degraded(|_| 0), 42);
    }

    #[test]
    fn test_outcome_degraded() {
        let outcome: Outcome<i32> = Outcome::Degraded("timeout".to_string());
        assert!(outcome.is_degraded());
        assert_eq!(outcome.degraded_reason(), Some("timeout"));
        assert_eq!(outcome.unwrap_or_else_degraded(|_| -1), -1);
    }

    #[test]
    fn test_outcome_map() {
        let outcome: Outcome<i32> = Outcome::Ok(2);
        assert_eq!(outcome.map(|v| v * 2), Outcome::Ok(4));

        let degraded: Outcome<i32> = Outcome::Degraded("nope".to_string());
        assert_eq!(
            degraded.map(|v| v * 2),
            Outcome::Degraded("nope".to_string())
        );
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: Outcome<u8> = Ok(7).into();
        assert_eq!(ok, Outcome::Ok(7));

        let err: Outcome<u8> =
            Err::<u8, _>(crate::Error::Inference("model timeout".to_string())).into();
        assert!(err.is_degraded());
        assert!(err.degraded_reason().unwrap().contains("model timeout"));
    }
}
