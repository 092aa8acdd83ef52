//! Deferred reclamation of decoded sources
//!
//! Decoded files are wrapped in `basedrop::Shared` before they reach the audio
//! thread. When the audio thread swaps a source out, dropping the old handle
//! only enqueues a pointer; the memory is released later on the `audio-gc`
//! thread, which owns the collector.
//!
//! ```ignore
//! let source = Shared::new(&gc_handle(), decoded);
//! producer.push(PlayerCommand::Load { source, generation })?;
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// How often the collector thread reclaims dropped sources
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

/// The collector thread's handle and its wake-up line
struct SourceCollector {
    handle: Handle,
    /// Each message asks for an immediate pass and carries the reply channel
    wake: Sender<Sender<()>>,
}

static COLLECTOR: OnceLock<SourceCollector> = OnceLock::new();

fn init_gc() -> SourceCollector {
    let (handle_tx, handle_rx) = mpsc::channel();
    let (wake, wake_rx) = mpsc::channel::<Sender<()>>();

    thread::Builder::new()
        .name("audio-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives and dies on this thread
            let mut collector = Collector::new();
            handle_tx.send(collector.handle()).expect("Failed to send GC handle");

            log::info!("Audio GC thread started");

            loop {
                match wake_rx.recv_timeout(COLLECT_INTERVAL) {
                    Ok(done) => {
                        collector.collect();
                        // The requester may have given up waiting
                        let _ = done.send(());
                    }
                    Err(RecvTimeoutError::Timeout) => collector.collect(),
                    Err(RecvTimeoutError::Disconnected) => {
                        collector.collect();
                        thread::sleep(COLLECT_INTERVAL);
                    }
                }
            }
        })
        .expect("Failed to spawn audio GC thread");

    SourceCollector {
        handle: handle_rx.recv().expect("Failed to receive GC handle"),
        wake,
    }
}

/// Handle for allocating `Shared<T>` values reclaimed off the audio thread
pub fn gc_handle() -> Handle {
    COLLECTOR.get_or_init(init_gc).handle.clone()
}

/// Run a collection pass now and wait for it to finish
///
/// Sources released before the call are freed when this returns. Use it
/// where memory has to be back right away, e.g. after unloading a long
/// file; otherwise the thread collects every 100 ms on its own.
pub fn collect_now() {
    let (done_tx, done_rx) = mpsc::channel();
    let collector = COLLECTOR.get_or_init(init_gc);
    if collector.wake.send(done_tx).is_ok() {
        let _ = done_rx.recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_shared_drop_is_deferred() {
        let value = Shared::new(&gc_handle(), vec![0.0f32; 1024]);
        let clone = Shared::clone(&value);
        assert_eq!(clone.len(), 1024);
        drop(value);
        drop(clone);
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_collect_now_frees_released_values() {
        let dropped = Arc::new(AtomicBool::new(false));
        let value = Shared::new(&gc_handle(), DropFlag(Arc::clone(&dropped)));
        let clone = Shared::clone(&value);

        drop(value);
        collect_now();
        assert!(!dropped.load(Ordering::SeqCst));

        drop(clone);
        collect_now();
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_handle_is_reused() {
        let a = gc_handle();
        let b = gc_handle();
        let x = Shared::new(&a, 1u32);
        let y = Shared::new(&b, 2u32);
        assert_eq!(*x + *y, 3);
    }
}
