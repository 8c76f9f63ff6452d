use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use eshim_frame::{Frame, FrameWriter};

use crate::error::Result;
use crate::pacing::Pacer;

/// Serializes outbound frames and spaces them by the pacing interval.
///
/// Callers queue on the writer lock; the holder waits for its turn, writes
/// one frame, and records the send time before releasing it.
pub struct Dispatcher<W> {
    writer: Mutex<FrameWriter<W>>,
    pacer: Pacer,
}

impl<W: Write> Dispatcher<W> {
    pub fn new(writer: W, min_interval: Duration) -> Self {
        Self {
            writer: Mutex::new(FrameWriter::new(writer)),
            pacer: Pacer::new(min_interval),
        }
    }

    /// Send one frame, blocking until the pacing interval allows it.
    pub fn send(&self, frame: &Frame) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.pacer.wait_turn();
        let result = writer.write_frame(frame);
        self.pacer.mark_sent();
        result.map_err(Into::into)
    }

    /// Frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .frames_written()
    }

    /// Run `f` against the underlying stream.
    pub fn with_stream<R>(&self, f: impl FnOnce(&W) -> R) -> R {
        let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        f(writer.get_ref())
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use eshim_frame::Register;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        sends: Vec<(Instant, Vec<u8>)>,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.sends.push((Instant::now(), buf.to_vec()));
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn back_to_back_sends_are_spaced_and_ordered() {
        let dispatcher = Dispatcher::new(Recorder::default(), Duration::from_millis(200));
        let registers = [Register::BusVoltage, Register::Status, Register::MaxOutPower];
        for register in registers {
            dispatcher.send(&Frame::read(register)).unwrap();
        }

        dispatcher.with_stream(|recorder| {
            assert_eq!(recorder.sends.len(), 3);
            for (sent, register) in recorder.sends.iter().zip(registers) {
                assert_eq!(sent.1[3], register.address());
            }
            for pair in recorder.sends.windows(2) {
                assert!(pair[1].0.duration_since(pair[0].0) >= Duration::from_millis(200));
            }
        });
        assert_eq!(dispatcher.frames_written(), 3);
    }

    #[test]
    fn concurrent_senders_are_all_spaced() {
        let dispatcher = std::sync::Arc::new(Dispatcher::new(
            Recorder::default(),
            Duration::from_millis(50),
        ));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = std::sync::Arc::clone(&dispatcher);
                std::thread::spawn(move || {
                    dispatcher.send(&Frame::read(Register::Status)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        dispatcher.with_stream(|recorder| {
            assert_eq!(recorder.sends.len(), 4);
            for pair in recorder.sends.windows(2) {
                assert!(pair[1].0.duration_since(pair[0].0) >= Duration::from_millis(50));
            }
        });
    }

    #[test]
    fn failed_send_still_counts_for_pacing() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let dispatcher = Dispatcher::new(Broken, Duration::from_millis(200));
        assert!(dispatcher.send(&Frame::read(Register::Status)).is_err());
        assert!(dispatcher.pacer().remaining() > Duration::ZERO);
    }
}
