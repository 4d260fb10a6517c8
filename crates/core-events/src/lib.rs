//! Core event types and channel helpers for the editor runtime.

use std::sync::atomic::AtomicU64;
use std::time::Instant;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

/// Bounded channel capacity between the input source and the main loop.
/// Single producer / single consumer, so blocking sends park rather than drop.
pub const EVENT_CHANNEL_CAP: usize = 8192;

/// Atomic counters, inspected in tests or periodically logged; no locking.
pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static CHANNEL_BLOCKING_SENDS: AtomicU64 = AtomicU64::new(0);
pub static PASTE_SESSIONS: AtomicU64 = AtomicU64::new(0);
pub static PASTE_CHUNKS: AtomicU64 = AtomicU64::new(0);
pub static PASTE_BYTES: AtomicU64 = AtomicU64::new(0);
pub static KEYPRESS_TOTAL: AtomicU64 = AtomicU64::new(0);
pub static KEYPRESS_REPEAT: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STARTS: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_SIGNAL: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_CHANNEL: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_STREAM: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_INPUT_STOP_ERROR: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the central event loop.
#[derive(Debug, Clone)]
pub enum Event {
    Input(InputEvent),
    Command(CommandEvent),
    RenderRequested,
    /// Periodic monotonic tick used to drive ephemeral expiry and refresh
    /// without busy polling.
    Tick,
    Shutdown,
}

// -------------------------------------------------------------------------------------------------
// Event Transform Hooks (no-op scaffolding)
// -------------------------------------------------------------------------------------------------
/// Optional hooks that can observe or transform events at the loop boundary.
/// Must not block; the default implementation is a no-op.
pub trait EventHooks: Send + Sync + 'static {
    fn pre_handle(&self, _event: &Event) {}
    fn post_handle(&self, _event: &Event) {}
}

/// Default no-op hooks implementation.
pub struct NoopEventHooks;

impl EventHooks for NoopEventHooks {}

/// Trait implemented by any async event producer. Implementors usually hold
/// configuration and spawn one background task that pushes `Event`s into the
/// shared channel. Each source is independent and failure-isolated; it must
/// terminate promptly once `tx.send` reports the channel closed.
pub trait AsyncEventSource: Send + 'static {
    /// Human-readable stable identifier (used for logging / diagnostics).
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task, returning a JoinHandle. Implementors should
    /// stop when `tx.send(..).await` returns Err (channel closed) or on their own internal stop
    /// condition. They should avoid busy loops by awaiting timers or external IO futures.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources. In this initial scaffold it stores boxed trait objects and can spawn
/// them all at startup. Later we can add dynamic add/remove and fine grained control.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-in monotonic tick source (replaces ad-hoc spawn in main.rs). Emits `Event::Tick` every
/// configured interval.
pub struct TickEventSource {
    interval: std::time::Duration,
}

impl TickEventSource {
    pub fn new(interval: std::time::Duration) -> Self {
        Self { interval }
    }
}

#[cfg(test)]
mod tests_async_sources {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct MockOnceSource {
        emitted: bool,
    }
    impl MockOnceSource {
        fn new() -> Self {
            Self { emitted: false }
        }
    }
    impl AsyncEventSource for MockOnceSource {
        fn name(&self) -> &'static str {
            "mock_once"
        }
        fn spawn(mut self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            tokio::spawn(async move {
                if !self.emitted {
                    let _ = tx.send(Event::RenderRequested).await;
                    self.emitted = true;
                }
            })
        }
    }

    #[tokio::test]
    async fn registry_spawns_and_emits() {
        let (tx, mut rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        reg.register(MockOnceSource::new());
        reg.register(TickEventSource::new(std::time::Duration::from_millis(10)));
        let handles = reg.spawn_all(&tx);
        // Expect at least one event from each source quickly.
        let mut got_render = false;
        let mut got_tick = false;
        let start = std::time::Instant::now();
        while start.elapsed() < std::time::Duration::from_millis(100) && (!got_render || !got_tick)
        {
            if let Ok(Some(ev)) =
                tokio::time::timeout(std::time::Duration::from_millis(5), rx.recv()).await
            {
                match ev {
                    Event::RenderRequested => got_render = true,
                    Event::Tick => got_tick = true,
                    _ => {}
                }
            }
        }
        assert!(
            got_render,
            "expected mock source to produce a render request"
        );
        assert!(got_tick, "expected tick source to emit tick events");

        drop(tx);
        drop(rx);
        for handle in handles {
            let _ = tokio::time::timeout(Duration::from_millis(20), handle).await;
        }
    }

    struct MockCloseSource {
        flag: Arc<AtomicBool>,
    }

    impl MockCloseSource {
        fn new(flag: Arc<AtomicBool>) -> Self {
            Self { flag }
        }
    }

    impl AsyncEventSource for MockCloseSource {
        fn name(&self) -> &'static str {
            "mock_close"
        }

        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            let flag = self.flag;
            tokio::spawn(async move {
                tx.closed().await;
                flag.store(true, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn registry_sources_exit_on_channel_drop() {
        let (tx, rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        let flag = Arc::new(AtomicBool::new(false));
        reg.register(MockCloseSource::new(flag.clone()));
        let handles = reg.spawn_all(&tx);

        drop(tx);
        drop(rx);

        for handle in handles {
            match tokio::time::timeout(Duration::from_millis(50), handle).await {
                Ok(join_res) => join_res.expect("source task should exit cleanly"),
                Err(_) => panic!("source task did not observe channel closure"),
            }
        }

        assert!(flag.load(Ordering::SeqCst));
    }
}

impl AsyncEventSource for TickEventSource {
    fn name(&self) -> &'static str {
        "tick"
    }
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            loop {
                interval.tick().await;
                if tx.send(Event::Tick).await.is_err() {
                    break;
                }
            }
        })
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }
    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }
    /// Spawn all registered sources, returning their JoinHandles. Caller owns the handles (may
    /// choose to detach or await during shutdown sequence).
    /// Spawn all registered sources, returning their JoinHandles. The supplied `Sender`
    /// reference stays owned by the caller; each source receives its own clone so no
    /// additional strong references linger inside the registry once this call returns.
    ///
    /// Ordering guarantee: call this after constructing the primary runtime channel and
    /// before the event loop begins consuming events. During shutdown the caller should
    /// drop its final `Sender` clone before awaiting the returned handles so the sources
    /// observe the closed channel and exit cooperatively.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        // Take ownership so duplicate spawns are prevented if called twice.
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "runtime.events", source = name, "spawning event source");
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

#[derive(Debug, Clone)]
pub enum CommandEvent {
    Quit,
}

/// Normalized input events produced by the terminal input decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Terminal resize (columns, rows).
    Resize(u16, u16),
    /// Synthetic interrupt (Ctrl-C).
    CtrlC,
    /// Logical key press with richer token model, timestamp, and repeat flag.
    ///
    /// Invariants:
    /// * `KeyEventExt::timestamp` must be monotonic per input task (each event
    ///   carries the instant observed from the async task).
    /// * `KeyEventExt::repeat` is `true` only for auto-repeat events emitted by
    ///   the terminal (it **must not** be synthesized downstream).
    /// * The associated `KeyToken` never contains raw payloads that should be
    ///   redacted from logs; consumers log only discriminants or lengths.
    KeyPress(KeyEventExt),
    /// One or more extended grapheme clusters ready for insertion (already NFC normalized).
    TextCommit(String),
    /// Start of a bracketed paste sequence (size unknown until end). Mapping layer can choose
    /// to treat the entire paste as a single atomic insertion for undo grouping.
    PasteStart,
    /// A chunk within a bracketed paste. Callers must only log its length,
    /// never the content.
    PasteChunk(String),
    /// End of a bracketed paste sequence.
    PasteEnd,
}

/// Rich keypress metadata emitted by the async input task.
///
/// Fields:
/// * `token`: Logical key identity (character, named key, or chord).
/// * `repeat`: Whether this event was reported as an auto-repeat by the
///   terminal. Downstream consumers may use this to avoid restarting
///   escape-timeout state while still applying motions.
/// * `timestamp`: Instant captured when the input task observed the event.
///
/// Constructors ensure timestamps are monotonically increasing when called in
/// event order, but callers may also provide explicit instants (useful for
/// tests or deserialization paths).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyEventExt {
    pub token: KeyToken,
    pub repeat: bool,
    pub timestamp: Instant,
}

impl KeyEventExt {
    /// Create a `KeyEventExt` using the current instant and `repeat = false`.
    pub fn new(token: KeyToken) -> Self {
        Self::from_parts(token, false, Instant::now())
    }

    /// Create a `KeyEventExt` using the current instant and explicit repeat bit.
    pub fn with_repeat(token: KeyToken, repeat: bool) -> Self {
        Self::from_parts(token, repeat, Instant::now())
    }

    /// Create a `KeyEventExt` with caller supplied timestamp (primarily for tests).
    pub fn from_parts(token: KeyToken, repeat: bool, timestamp: Instant) -> Self {
        Self {
            token,
            repeat,
            timestamp,
        }
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ModMask: u16 { const CTRL=1; const ALT=2; const SHIFT=4; const META=8; const SUPER=16; }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Enter,
    Esc,
    Backspace,
    Tab,
    F(u8),
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
}

/// Canonical logical key tokens surfaced by the input decoder.
///
/// `KeyToken::Chord` wraps a base token plus modifier mask, ensuring consumers
/// can faithfully reconstruct combinations such as Ctrl-D.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyToken {
    Char(char),
    Named(NamedKey),
    Chord { base: Box<KeyToken>, mods: ModMask },
}

/// Helper result type for channel creation.
pub type EventResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn key_event_ext_new_defaults() {
        let token = KeyToken::Char('a');
        let evt = KeyEventExt::new(token.clone());
        assert_eq!(evt.token, token);
        assert!(!evt.repeat, "new() must default repeat to false");
        assert!(evt.timestamp <= Instant::now());
    }

    #[test]
    fn key_event_ext_with_repeat_and_from_parts() {
        let token = KeyToken::Named(NamedKey::Enter);
        let ts = Instant::now();
        let evt = KeyEventExt::from_parts(token.clone(), true, ts);
        assert_eq!(evt.token, token);
        assert!(evt.repeat);
        assert_eq!(evt.timestamp, ts);

        let repeat_evt = KeyEventExt::with_repeat(token.clone(), false);
        assert_eq!(repeat_evt.token, token);
        assert!(!repeat_evt.repeat);
        assert!(repeat_evt.timestamp >= ts);
    }

    #[test]
    fn key_token_chord_round_trip() {
        let mods = ModMask::CTRL | ModMask::ALT;
        let base = KeyToken::Named(NamedKey::Down);
        let chord = KeyToken::Chord {
            base: Box::new(base.clone()),
            mods,
        };
        let evt = KeyEventExt::with_repeat(chord.clone(), true);
        match evt.token {
            KeyToken::Chord {
                base: boxed_base,
                mods: observed_mods,
            } => {
                assert_eq!(*boxed_base, base);
                assert_eq!(observed_mods, mods);
            }
            other => panic!("expected chord token, got {:?}", other),
        }
        assert!(evt.repeat);
    }
}
