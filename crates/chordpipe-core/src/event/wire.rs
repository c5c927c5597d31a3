// Chordpipe Wire Format
// Line-delimited JSON event source and sink

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use super::Event;

/// Errors that can occur while writing events
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// How often a waiting source re-checks the interrupt flag
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Reads one JSON event per line.
///
/// Lines are read on a dedicated thread, so an interrupt is noticed even
/// while the listener is silent. Whatever ends the input (EOF, a read error,
/// or the interrupt flag) the source yields a single `exit` event last, so
/// stateful stages downstream always get to flush.
pub struct LineSource {
    lines: Receiver<io::Result<String>>,
    interrupted: Option<Arc<AtomicBool>>,
    line_no: usize,
    finished: bool,
}

impl LineSource {
    pub fn new<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = bounded(64);
        thread::spawn(move || read_lines(reader, tx));
        Self {
            lines: rx,
            interrupted: None,
            line_no: 0,
            finished: false,
        }
    }

    /// Stop (emitting `exit`) once `flag` is set
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(flag);
        self
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn finish(&mut self) -> Option<Event> {
        self.finished = true;
        Some(Event::exit())
    }
}

/// Reader thread body; ends at EOF, on the first error, or when the source
/// is dropped
fn read_lines<R: BufRead>(mut reader: R, tx: Sender<io::Result<String>>) {
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => {
                if tx.send(Ok(line)).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                return;
            }
        }
    }
}

impl Iterator for LineSource {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        if self.finished {
            return None;
        }
        loop {
            if self.is_interrupted() {
                log::debug!("input interrupted after {} lines", self.line_no);
                return self.finish();
            }
            match self.lines.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(line)) => {
                    self.line_no += 1;
                    let text = line.trim();
                    if text.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Event>(text) {
                        Ok(event) => {
                            if event.is(&super::EventType::Exit) {
                                self.finished = true;
                            }
                            return Some(event);
                        }
                        Err(e) => {
                            log::warn!("skipping malformed line {}: {}", self.line_no, e);
                        }
                    }
                }
                Ok(Err(e)) => {
                    log::warn!("input read failed: {}", e);
                    return self.finish();
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    log::debug!("end of input after {} lines", self.line_no);
                    return self.finish();
                }
            }
        }
    }
}

/// Write every event as one compact JSON line, flushing after each.
///
/// `output` events are unwrapped so their payload reaches the sink as a
/// top-level document.
pub fn write_events<W: Write>(
    events: impl IntoIterator<Item = Event>,
    mut writer: W,
) -> Result<usize, WireError> {
    let mut written = 0;
    for event in events {
        serde_json::to_writer(&mut writer, &event.sink_document())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, Value};
    use std::io::Cursor;

    #[test]
    fn test_source_appends_exit() {
        let input = "{\"type\":\"keydown\",\"physkey\":\"_001E\"}\n";
        let events: Vec<Event> = LineSource::new(Cursor::new(input)).collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), &EventType::KeyDown);
        assert_eq!(events[1].kind(), &EventType::Exit);
    }

    #[test]
    fn test_source_skips_blank_and_malformed_lines() {
        let input = "\n{not json}\n{\"physkey\":1}\n{\"type\":\"keyup\",\"physkey\":1}\n";
        let events: Vec<Event> = LineSource::new(Cursor::new(input)).collect();
        let kinds: Vec<&EventType> = events.iter().map(Event::kind).collect();
        assert_eq!(kinds, vec![&EventType::KeyUp, &EventType::Exit]);
    }

    #[test]
    fn test_source_stops_at_explicit_exit() {
        let input = "{\"type\":\"exit\"}\n{\"type\":\"keyup\",\"physkey\":1}\n";
        let events: Vec<Event> = LineSource::new(Cursor::new(input)).collect();
        assert_eq!(events, vec![Event::exit()]);
    }

    #[test]
    fn test_source_interrupt_yields_exit() {
        let flag = Arc::new(AtomicBool::new(true));
        let input = "{\"type\":\"keydown\",\"physkey\":1}\n";
        let events: Vec<Event> = LineSource::new(Cursor::new(input))
            .with_interrupt(flag)
            .collect();
        assert_eq!(events, vec![Event::exit()]);
    }

    /// A listener that never sends anything
    struct Silent;

    impl io::Read for Silent {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            loop {
                thread::sleep(Duration::from_secs(60));
            }
        }
    }

    impl BufRead for Silent {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            loop {
                thread::sleep(Duration::from_secs(60));
            }
        }

        fn consume(&mut self, _amt: usize) {}
    }

    #[test]
    fn test_interrupt_while_input_idle_yields_exit() {
        let flag = Arc::new(AtomicBool::new(false));
        let mut source = LineSource::new(Silent).with_interrupt(Arc::clone(&flag));

        let setter = Arc::clone(&flag);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            setter.store(true, Ordering::SeqCst);
        });

        let started = std::time::Instant::now();
        assert_eq!(source.next(), Some(Event::exit()));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(source.next(), None);
    }

    #[test]
    fn test_read_error_yields_exit() {
        struct Broken;
        impl io::Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "listener gone"))
            }
        }
        let events: Vec<Event> = LineSource::new(io::BufReader::new(Broken)).collect();
        assert_eq!(events, vec![Event::exit()]);
    }

    #[test]
    fn test_write_events_unwraps_output() {
        let inner = Event::key_up("win_virtualkey", 91);
        let events = vec![
            Event::key_down("win_virtualkey", 65).with("extra", Value::from("kept")),
            Event::output(&inner),
        ];
        let mut buf = Vec::new();
        let written = write_events(events, &mut buf).unwrap();
        assert_eq!(written, 2);
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"type":"keydown","win_virtualkey":65,"extra":"kept"}"#,
                r#"{"type":"keyup","win_virtualkey":91}"#,
            ]
        );
    }
}
