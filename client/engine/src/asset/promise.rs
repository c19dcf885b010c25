use crate::asset::AssetError;
use std::time::Duration;

pub type AssetResult<I> = Result<I, AssetError>;

/// Producer half of a one-shot asset result.
pub struct Promise<I> {
    sender: oneshot::Sender<AssetResult<I>>,
}

/// Consumer half of a one-shot asset result.
///
/// A promise dropped without being fulfilled is observed as [`AssetError::Canceled`],
/// so a waiter never hangs on an abandoned job.
pub struct AssetFuture<I> {
    receiver: oneshot::Receiver<AssetResult<I>>,
}

pub fn promise<I>() -> (Promise<I>, AssetFuture<I>) {
    let (sender, receiver) = oneshot::channel();
    (Promise { sender }, AssetFuture { receiver })
}

impl<I> Promise<I> {
    pub fn fulfill(self, result: AssetResult<I>) {
        // Nobody waits if the future has been dropped.
        let _ = self.sender.send(result);
    }
}

impl<I> AssetFuture<I> {
    pub fn wait(self) -> AssetResult<I> {
        self.receiver.recv().unwrap_or(Err(AssetError::Canceled))
    }

    /// Returns `None` on timeout. The result is delivered at most once.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<AssetResult<I>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(oneshot::RecvTimeoutError::Timeout) => None,
            Err(oneshot::RecvTimeoutError::Disconnected) => Some(Err(AssetError::Canceled)),
        }
    }

    pub fn try_get(&self) -> Option<AssetResult<I>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::TryRecvError::Empty) => None,
            Err(oneshot::TryRecvError::Disconnected) => Some(Err(AssetError::Canceled)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fulfilled_from_another_thread() {
        let (promise, future) = promise::<u32>();
        let handle = thread::spawn(move || promise.fulfill(Ok(7)));
        assert_eq!(future.wait().unwrap(), 7);
        handle.join().unwrap();
    }

    #[test]
    fn dropped_promise_cancels() {
        let (promise, future) = promise::<u32>();
        assert!(future.try_get().is_none());
        drop(promise);
        assert!(matches!(future.try_get(), Some(Err(AssetError::Canceled))));
    }

    #[test]
    fn wait_timeout_expires() {
        let (_promise, future) = promise::<u32>();
        assert!(future.wait_timeout(Duration::from_millis(10)).is_none());
    }
}
