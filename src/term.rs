use std::collections::VecDeque;
use std::io::{self, stdin, stdout, IsTerminal, Read, Write};
use std::ops::{Deref, DerefMut};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyEvent},
    terminal,
};

/// Exit status used when the user interrupts a run with `Ctrl+C`.
pub const INTERRUPT_EXIT_CODE: i32 = 130;

/// Character I/O as seen by the machine.
///
/// Exactly one host implementation exists ([`HostTerminal`]); [`BufferTerminal`] is
/// an in-memory stand-in for tests and embedding.
pub trait Terminal {
    /// Stop line buffering and echo of input.
    fn enter_raw_mode(&mut self) -> io::Result<()>;
    /// Undo [`Terminal::enter_raw_mode`].
    fn restore_mode(&mut self) -> io::Result<()>;
    /// Non-blocking check for a byte which [`Terminal::read_byte`] would return immediately.
    fn poll_input_available(&mut self) -> io::Result<bool>;
    /// Block until one byte of input is available, and consume it.
    fn read_byte(&mut self) -> io::Result<u8>;
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    /// Called periodically while running, so that an interrupt can be noticed by programs
    /// which never read input.
    fn service_interrupts(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps a terminal in raw mode for as long as it is alive.
pub struct RawMode<T: Terminal> {
    inner: T,
}

impl<T: Terminal> RawMode<T> {
    pub fn enter(mut inner: T) -> io::Result<Self> {
        inner.enter_raw_mode()?;
        Ok(Self { inner })
    }
}

impl<T: Terminal> Drop for RawMode<T> {
    fn drop(&mut self) {
        // Nothing sensible left to do if this fails
        let _ = self.inner.restore_mode();
    }
}

impl<T: Terminal> Deref for RawMode<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: Terminal> DerefMut for RawMode<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: Terminal> Terminal for RawMode<T> {
    fn enter_raw_mode(&mut self) -> io::Result<()> {
        self.inner.enter_raw_mode()
    }
    fn restore_mode(&mut self) -> io::Result<()> {
        self.inner.restore_mode()
    }
    fn poll_input_available(&mut self) -> io::Result<bool> {
        self.inner.poll_input_available()
    }
    fn read_byte(&mut self) -> io::Result<u8> {
        self.inner.read_byte()
    }
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_bytes(bytes)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
    fn service_interrupts(&mut self) -> io::Result<()> {
        self.inner.service_interrupts()
    }
}

/// Standard input and output of this process.
///
/// If stdin is an interactive terminal, input is read as key events in raw mode.
/// Otherwise stdin is drained by a [`PipedInput`], and raw mode is never entered.
pub struct HostTerminal {
    /// `None` when stdin is interactive
    piped: Option<PipedInput>,
    raw: bool,
    /// Bytes read from the host but not yet consumed by the machine.
    /// Multi-byte characters are buffered here, one byte per read.
    pending: VecDeque<u8>,
}

impl HostTerminal {
    pub fn new() -> Self {
        if stdin().is_terminal() {
            Self {
                piped: None,
                raw: false,
                pending: VecDeque::new(),
            }
        } else {
            Self::piped(stdin())
        }
    }

    /// Take input from a non-interactive source instead of stdin.
    pub fn piped(source: impl Read + Send + 'static) -> Self {
        Self {
            piped: Some(PipedInput::spawn(source)),
            raw: false,
            pending: VecDeque::new(),
        }
    }

    /// Convert one terminal event to bytes of input, if it represents any.
    ///
    /// `Ctrl+C` will always return the terminal to normal state and exit.
    fn accept_event(&mut self, event: Event) {
        let Event::Key(event) = event else {
            return;
        };
        match key_input(event) {
            Some(KeyInput::Char(ch)) => {
                let mut bytes = [0u8; 4];
                self.pending
                    .extend(ch.encode_utf8(&mut bytes).as_bytes().iter().copied());
            }
            Some(KeyInput::Interrupt) => self.interrupt(),
            None => (),
        }
    }

    /// Move every queued terminal event into `pending`, without blocking.
    fn drain_events(&mut self) -> io::Result<()> {
        while event::poll(Duration::ZERO)? {
            let event = event::read()?;
            self.accept_event(event);
        }
        Ok(())
    }

    fn interrupt(&mut self) -> ! {
        let _ = self.restore_mode();
        println!();
        std::process::exit(INTERRUPT_EXIT_CODE);
    }
}

impl Default for HostTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for HostTerminal {
    fn enter_raw_mode(&mut self) -> io::Result<()> {
        if self.piped.is_none() && !self.raw {
            terminal::enable_raw_mode()?;
            self.raw = true;
        }
        Ok(())
    }

    fn restore_mode(&mut self) -> io::Result<()> {
        if self.raw {
            terminal::disable_raw_mode()?;
            self.raw = false;
        }
        Ok(())
    }

    fn poll_input_available(&mut self) -> io::Result<bool> {
        if self.pending.is_empty() {
            match &mut self.piped {
                Some(piped) => self.pending.extend(piped.try_next()),
                None => self.drain_events()?,
            }
        }
        Ok(!self.pending.is_empty())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        loop {
            if let Some(byte) = self.pending.pop_front() {
                return Ok(byte);
            }
            match &mut self.piped {
                Some(piped) => {
                    return piped.next_blocking().ok_or_else(|| {
                        io::Error::new(io::ErrorKind::UnexpectedEof, "standard input was closed")
                    });
                }
                None => {
                    let event = event::read()?;
                    self.accept_event(event);
                }
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut out = stdout().lock();
        if self.raw {
            raw_newlines(bytes, &mut out)
        } else {
            out.write_all(bytes)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        stdout().flush()
    }

    fn service_interrupts(&mut self) -> io::Result<()> {
        if self.piped.is_none() {
            self.drain_events()?;
        }
        Ok(())
    }
}

/// Write `bytes` with every `\n` expanded to `\r\n`.
///
/// Raw mode disables output processing, so newlines must also return the cursor.
fn raw_newlines(bytes: &[u8], out: &mut impl Write) -> io::Result<()> {
    for line in bytes.split_inclusive(|&byte| byte == b'\n') {
        match line.split_last() {
            Some((&b'\n', rest)) => {
                out.write_all(rest)?;
                out.write_all(b"\r\n")?;
            }
            _ => out.write_all(line)?,
        }
    }
    Ok(())
}

/// Non-interactive input, read ahead by a background thread.
///
/// Checking for input never blocks, even while the source has nothing to give.
pub struct PipedInput {
    rx: Receiver<u8>,
}

impl PipedInput {
    pub fn spawn(mut source: impl Read + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = [0u8; 256];
            loop {
                let len = match source.read(&mut buf) {
                    Ok(0) => break,
                    Ok(len) => len,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    // Treated as end of input
                    Err(_) => break,
                };
                // Receiver gone: the machine has stopped
                if buf[..len].iter().any(|&byte| tx.send(byte).is_err()) {
                    break;
                }
            }
        });
        Self { rx }
    }

    /// Next byte if one has already arrived.
    pub fn try_next(&mut self) -> Option<u8> {
        match self.rx.try_recv() {
            Ok(byte) => Some(byte),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the next byte arrives. `None` once the source is exhausted.
    pub fn next_blocking(&mut self) -> Option<u8> {
        self.rx.recv().ok()
    }
}

/// Similar to [`crossterm::event::KeyCode`] but only contains what the machine can read.
#[derive(Debug, PartialEq, Eq)]
enum KeyInput {
    Char(char),
    Interrupt,
}

fn key_input(event: KeyEvent) -> Option<KeyInput> {
    use event::{KeyCode, KeyEventKind, KeyModifiers as Mod};

    if matches!(event.kind, KeyEventKind::Release) {
        return None;
    }

    let ch = match (event.modifiers, event.code) {
        // Ctrl+C
        (Mod::CONTROL, KeyCode::Char('c')) => return Some(KeyInput::Interrupt),

        (_, KeyCode::Enter) => '\n',
        (_, KeyCode::Tab) => '\t',
        (_, KeyCode::Backspace) => '\x08',
        (_, KeyCode::Esc) => '\x1b',
        (_, KeyCode::Delete) => '\x7f',

        // Ctrl+letter as ASCII control character
        (Mod::CONTROL, KeyCode::Char(ch)) if ch.is_ascii_alphabetic() => {
            ((ch.to_ascii_lowercase() as u8) - b'a' + 1) as char
        }

        // Normal character
        (Mod::NONE | Mod::SHIFT, KeyCode::Char(ch)) => ch,

        _ => return None,
    };
    Some(KeyInput::Char(ch))
}

/// In-memory terminal with scripted input and captured output.
///
/// Input bytes become available to polling one at a time, in order.
#[derive(Debug, Default)]
pub struct BufferTerminal {
    input: VecDeque<u8>,
    output: Vec<u8>,
    raw: bool,
}

impl BufferTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(input: impl AsRef<[u8]>) -> Self {
        let mut term = Self::new();
        term.push_input(input);
        term
    }

    /// Queue more bytes as if they were typed.
    pub fn push_input(&mut self, input: impl AsRef<[u8]>) {
        self.input.extend(input.as_ref().iter().copied());
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }
}

impl Terminal for BufferTerminal {
    fn enter_raw_mode(&mut self) -> io::Result<()> {
        self.raw = true;
        Ok(())
    }

    fn restore_mode(&mut self) -> io::Result<()> {
        self.raw = false;
        Ok(())
    }

    fn poll_input_available(&mut self) -> io::Result<bool> {
        Ok(!self.input.is_empty())
    }

    fn read_byte(&mut self) -> io::Result<u8> {
        self.input.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "no more scripted input")
        })
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEventKind, KeyEventState, KeyModifiers};
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Instant;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn key_events_to_input() {
        assert_eq!(
            key_input(key(KeyCode::Char('a'), KeyModifiers::NONE)),
            Some(KeyInput::Char('a'))
        );
        assert_eq!(
            key_input(key(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Some(KeyInput::Char('A'))
        );
        assert_eq!(
            key_input(key(KeyCode::Enter, KeyModifiers::NONE)),
            Some(KeyInput::Char('\n'))
        );
        assert_eq!(
            key_input(key(KeyCode::Char('d'), KeyModifiers::CONTROL)),
            Some(KeyInput::Char('\x04'))
        );
        assert_eq!(
            key_input(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyInput::Interrupt)
        );
        assert_eq!(key_input(key(KeyCode::Left, KeyModifiers::NONE)), None);

        let mut release = key(KeyCode::Char('a'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(key_input(release), None);
    }

    /// Shares its raw state so it can be observed after the guard is gone.
    struct SharedRaw(Rc<Cell<bool>>);

    impl Terminal for SharedRaw {
        fn enter_raw_mode(&mut self) -> io::Result<()> {
            self.0.set(true);
            Ok(())
        }
        fn restore_mode(&mut self) -> io::Result<()> {
            self.0.set(false);
            Ok(())
        }
        fn poll_input_available(&mut self) -> io::Result<bool> {
            Ok(false)
        }
        fn read_byte(&mut self) -> io::Result<u8> {
            Err(io::ErrorKind::UnexpectedEof.into())
        }
        fn write_bytes(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn raw_mode_is_restored_on_drop() {
        let raw = Rc::new(Cell::new(false));
        let guard = RawMode::enter(SharedRaw(raw.clone())).unwrap();
        assert!(raw.get());
        drop(guard);
        assert!(!raw.get());
    }

    #[test]
    fn raw_mode_is_restored_on_panic() {
        let raw = Rc::new(Cell::new(false));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = RawMode::enter(SharedRaw(raw.clone())).unwrap();
            panic!("machine fault");
        }));
        assert!(result.is_err());
        assert!(!raw.get());
    }

    #[test]
    fn buffer_terminal_consumes_input_once() {
        let mut term = BufferTerminal::with_input("ab");
        assert!(term.poll_input_available().unwrap());
        assert_eq!(term.read_byte().unwrap(), b'a');
        assert_eq!(term.read_byte().unwrap(), b'b');
        assert!(!term.poll_input_available().unwrap());
        assert!(term.read_byte().is_err());
    }

    /// Never yields data; blocks until its sender is dropped, then reports end of input.
    struct IdleSource(Receiver<()>);

    impl Read for IdleSource {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[test]
    fn piped_poll_does_not_wait_for_idle_source() {
        let (hold_open, idle) = mpsc::channel();
        let mut term = HostTerminal::piped(IdleSource(idle));

        let start = Instant::now();
        assert!(!term.poll_input_available().unwrap());
        assert!(!term.poll_input_available().unwrap());
        assert!(start.elapsed() < Duration::from_millis(500));

        drop(hold_open);
        let err = term.read_byte().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(!term.poll_input_available().unwrap());
    }

    #[test]
    fn piped_keyboard_status_does_not_wait_for_idle_source() {
        use crate::memory::{Memory, KBSR};

        let (_hold_open, idle) = mpsc::channel();
        let mut term = HostTerminal::piped(IdleSource(idle));
        let mut mem = Memory::new();

        let start = Instant::now();
        assert_eq!(mem.read(KBSR, &mut term).unwrap(), 0);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn piped_input_is_delivered_in_order() {
        let mut term = HostTerminal::piped(&b"ok"[..]);
        assert_eq!(term.read_byte().unwrap(), b'o');
        assert_eq!(term.read_byte().unwrap(), b'k');
        assert!(term.read_byte().is_err());
    }

    #[test]
    fn piped_poll_sees_arrived_input() {
        let mut input = PipedInput::spawn(&b"z"[..]);
        // Wait for the reader thread instead of racing it
        assert_eq!(input.next_blocking(), Some(b'z'));
        assert_eq!(input.next_blocking(), None);
        assert_eq!(input.try_next(), None);

        let mut term = HostTerminal::piped(&b"q"[..]);
        let start = Instant::now();
        while !term.poll_input_available().unwrap() {
            assert!(start.elapsed() < Duration::from_secs(5), "input never arrived");
            thread::yield_now();
        }
        assert_eq!(term.read_byte().unwrap(), b'q');
    }

    fn with_raw_newlines(bytes: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        raw_newlines(bytes, &mut out).unwrap();
        out
    }

    #[test]
    fn raw_output_returns_cursor() {
        assert_eq!(with_raw_newlines(b"HALT\n"), b"HALT\r\n");
        assert_eq!(with_raw_newlines(b"a\n\nb"), b"a\r\n\r\nb");
        assert_eq!(with_raw_newlines(b"\n"), b"\r\n");
        assert_eq!(with_raw_newlines(b"no newline"), b"no newline");
        assert_eq!(with_raw_newlines(b""), b"");
    }
}
