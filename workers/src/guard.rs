use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use anyhow::anyhow;

/// Runs `f`, turning a panic into an error so every catch boundary sees one
/// failure type.
pub(crate) fn catch_unwind<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passes_through_results() {
        assert_eq!(catch_unwind(|| Ok(5)).unwrap(), 5);
        assert!(catch_unwind::<(), _>(|| Err(anyhow!("nope"))).is_err());
    }

    #[test]
    fn test_converts_panics() {
        let err = catch_unwind::<(), _>(|| panic!("kaboom")).unwrap_err();
        assert_eq!(err.to_string(), "panicked: kaboom");

        let code = 7;
        let err = catch_unwind::<(), _>(|| panic!("code {}", code)).unwrap_err();
        assert_eq!(err.to_string(), "panicked: code 7");
    }
}
