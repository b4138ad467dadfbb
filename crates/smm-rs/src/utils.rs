use std::fmt::Debug;
use tokio::sync::watch;

/// Receiving half of a cancellation signal. Sending `true` on the paired
/// sender requests cancellation.
pub type CancelSignal = watch::Receiver<bool>;

/// A signal that never fires, for callers that do not need cancellation.
pub fn never_cancelled() -> CancelSignal {
    watch::channel(false).1
}

/// Whether cancellation has been requested, without waiting.
#[inline]
pub fn is_cancelled(signal: &CancelSignal) -> bool {
    *signal.borrow()
}

/// Resolves once cancellation is requested.
///
/// A signal whose sender is gone without ever sending `true` never resolves.
pub async fn cancelled(signal: &mut CancelSignal) {
    if signal.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// `unwrap` for results that cannot fail, unchecked in release builds.
pub trait ResultExt<T, E> {
    fn infallible(self) -> T;
}

impl<T, E: Debug> ResultExt<T, E> for Result<T, E> {
    #[cfg(not(debug_assertions))]
    fn infallible(self) -> T {
        unsafe { self.unwrap_unchecked() }
    }

    #[cfg(debug_assertions)]
    fn infallible(self) -> T {
        self.expect("infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancelled_fires_on_signal() {
        let (tx, mut rx) = watch::channel(false);
        assert!(!is_cancelled(&rx));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), cancelled(&mut rx))
            .await
            .expect("cancellation should be observed");
        assert!(is_cancelled(&rx));
    }

    #[tokio::test]
    async fn test_never_cancelled_stays_pending() {
        let mut signal = never_cancelled();
        let waited = tokio::time::timeout(Duration::from_millis(50), cancelled(&mut signal)).await;
        assert!(waited.is_err());
        assert!(!is_cancelled(&signal));
    }
}
