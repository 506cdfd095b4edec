//! 후행 디바운스
//!
//! `schedule` 할 때마다 대기 중인 호출을 취소하고 마지막 값으로 `delay` 뒤에
//! 한 번 실행한다. 출력 스트림마다 하나씩 만들어 재사용한다.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

type Sink<T> = Arc<dyn Fn(T) + Send + Sync>;

pub struct Debouncer<T> {
    delay: Duration,
    sink: Sink<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration, sink: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            sink: Arc::new(sink),
            pending: None,
        }
    }

    /// tokio 런타임 안에서 호출해야 한다
    pub fn schedule(&mut self, value: T) {
        self.cancel();

        let sink = self.sink.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            sink(value);
        }));
    }
}

impl<T> Debouncer<T> {
    /// 대기 중인 호출을 실행하지 않고 버린다
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn recording(delay_ms: u64) -> (Debouncer<u32>, mpsc::UnboundedReceiver<u32>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Debouncer::new(Duration::from_millis(delay_ms), move |v| {
            let _ = tx.send(v);
        });
        (debouncer, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_last_value() {
        let (mut debouncer, mut rx) = recording(100);

        for i in 1..=5 {
            debouncer.schedule(i);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rx.try_recv().unwrap(), 5);
        assert!(rx.try_recv().is_err());
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_gaps_fire_each_call() {
        let (mut debouncer, mut rx) = recording(300);

        debouncer.schedule(1);
        tokio::time::sleep(Duration::from_millis(400)).await;
        debouncer.schedule(2);
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(rx.try_recv().unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_call() {
        let (mut debouncer, mut rx) = recording(100);

        debouncer.schedule(7);
        assert!(debouncer.is_pending());
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(rx.try_recv().is_err());
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_pending_call() {
        let (mut debouncer, mut rx) = recording(100);
        debouncer.schedule(9);
        drop(debouncer);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }
}
