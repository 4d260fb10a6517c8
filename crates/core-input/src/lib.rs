//! Terminal input decoding: a hand-rolled byte-ring CSI/SS3 decoder (§4.8)
//! plus the async task that feeds it from stdin. No `crossterm::EventStream`
//! — decoding is done entirely by [`decoder::Decoder`], grounded in
//! `term-read.c`/`xterm-keys.c`.

pub mod decoder;
pub use decoder::{DecodeOutcome, Decoder};

use core_events::Event;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, stdin};
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

const READ_CHUNK: usize = 256;

/// Default time to wait for more bytes after a bare `ESC` or a truncated
/// escape sequence before giving up and flushing what's buffered.
pub const DEFAULT_ESC_TIMEOUT: Duration = Duration::from_millis(25);

/// Handle used to request the async input task stop reading.
#[derive(Clone)]
pub struct AsyncInputShutdown {
    flag: Arc<AtomicBool>,
}

impl AsyncInputShutdown {
    fn new() -> (Self, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (Self { flag: flag.clone() }, flag)
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

/// Spawn the async input task: reads stdin into a ring, decodes via
/// [`Decoder`], and forwards [`Event::Input`] to `sender`.
pub fn spawn_async_input(sender: Sender<Event>) -> (JoinHandle<()>, AsyncInputShutdown) {
    spawn_async_input_with_timeout(sender, DEFAULT_ESC_TIMEOUT)
}

pub fn spawn_async_input_with_timeout(
    sender: Sender<Event>,
    esc_timeout: Duration,
) -> (JoinHandle<()>, AsyncInputShutdown) {
    let (shutdown, flag) = AsyncInputShutdown::new();
    core_events::ASYNC_INPUT_STARTS.fetch_add(1, Ordering::Relaxed);
    let handle = tokio::spawn(async move {
        run_input_loop(sender, flag, esc_timeout).await;
    });
    (handle, shutdown)
}

async fn run_input_loop(sender: Sender<Event>, stop: Arc<AtomicBool>, esc_timeout: Duration) {
    let mut input = stdin();
    let mut ring: Vec<u8> = Vec::with_capacity(512);
    let mut decoder = Decoder::new();
    let mut read_buf = [0u8; READ_CHUNK];

    loop {
        if stop.load(Ordering::Relaxed) {
            core_events::ASYNC_INPUT_STOP_SIGNAL.fetch_add(1, Ordering::Relaxed);
            return;
        }

        match decoder.step(&ring) {
            DecodeOutcome::Event(len, event) => {
                ring.drain(..len);
                tracing::trace!(target: "input.decode", ?event, len, "decoded event");
                match &event {
                    core_events::InputEvent::KeyPress(ev) => {
                        core_events::KEYPRESS_TOTAL.fetch_add(1, Ordering::Relaxed);
                        if ev.repeat {
                            core_events::KEYPRESS_REPEAT.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    core_events::InputEvent::PasteStart => {
                        core_events::PASTE_SESSIONS.fetch_add(1, Ordering::Relaxed);
                    }
                    core_events::InputEvent::PasteChunk(text) => {
                        core_events::PASTE_CHUNKS.fetch_add(1, Ordering::Relaxed);
                        core_events::PASTE_BYTES.fetch_add(text.len() as u64, Ordering::Relaxed);
                    }
                    _ => {}
                }
                if sender.send(Event::Input(event)).await.is_err() {
                    core_events::ASYNC_INPUT_STOP_CHANNEL.fetch_add(1, Ordering::Relaxed);
                    core_events::CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                continue;
            }
            DecodeOutcome::Discard(len) => {
                tracing::trace!(target: "input.decode", len, "discarding unrecognized escape sequence");
                ring.drain(..len);
                continue;
            }
            DecodeOutcome::NeedMoreInput => {}
        }

        let read_result = if ring.is_empty() {
            input.read(&mut read_buf).await
        } else {
            match tokio::time::timeout(esc_timeout, input.read(&mut read_buf)).await {
                Ok(result) => result,
                Err(_) => {
                    // Timed out waiting for the rest of an escape sequence;
                    // force progress by treating a lone ESC as the Esc key.
                    if ring.first() == Some(&0x1b) {
                        ring.drain(..1);
                        let _ = sender
                            .send(Event::Input(core_events::InputEvent::KeyPress(
                                core_events::KeyEventExt::new(core_events::KeyToken::Named(
                                    core_events::NamedKey::Esc,
                                )),
                            )))
                            .await;
                    } else {
                        ring.clear();
                    }
                    continue;
                }
            }
        };

        match read_result {
            Ok(0) => {
                core_events::ASYNC_INPUT_STOP_STREAM.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Ok(n) => ring.extend_from_slice(&read_buf[..n]),
            Err(_) => {
                core_events::ASYNC_INPUT_STOP_ERROR.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::InputEvent;

    #[test]
    fn shutdown_handle_sets_its_flag() {
        let (shutdown, flag) = AsyncInputShutdown::new();
        assert!(!flag.load(Ordering::Relaxed));
        shutdown.request_stop();
        assert!(flag.load(Ordering::Relaxed));
    }

    #[test]
    fn decoder_reused_across_steps_tracks_paste_state() {
        let mut d = Decoder::new();
        match d.step(b"\x1b[200~") {
            DecodeOutcome::Event(_, InputEvent::PasteStart) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }
}
