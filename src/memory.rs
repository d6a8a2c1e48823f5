use std::io;

use crate::term::Terminal;

/// LC3 addresses 65536 words of memory.
pub const MEMORY_MAX: usize = 0x10000;

/// Keyboard status register. Bit 15 is set while a key is ready in [`KBDR`].
pub const KBSR: u16 = 0xFE00;
/// Keyboard data register.
pub const KBDR: u16 = 0xFE02;

/// Flat word-addressed memory.
///
/// Reading [`KBSR`] polls the terminal for input. All other accesses, and every write, are
/// plain.
pub struct Memory {
    data: Box<[u16; MEMORY_MAX]>,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            data: Box::new([0; MEMORY_MAX]),
        }
    }

    /// Read a word as the running program sees it.
    pub fn read<T>(&mut self, addr: u16, term: &mut T) -> io::Result<u16>
    where
        T: Terminal + ?Sized,
    {
        if addr == KBSR {
            if term.poll_input_available()? {
                self.data[KBSR as usize] = 1 << 15;
                self.data[KBDR as usize] = term.read_byte()? as u16;
            } else {
                self.data[KBSR as usize] = 0;
            }
        }
        Ok(self.get(addr))
    }

    /// Read a stored word without any device side effects.
    pub fn get(&self, addr: u16) -> u16 {
        self.data[addr as usize]
    }

    pub fn write(&mut self, addr: u16, val: u16) {
        self.data[addr as usize] = val;
    }

    /// Words from `base` up to (not including) the first zero word, or the end of memory.
    pub fn string_from(&self, base: u16) -> impl Iterator<Item = u16> + '_ {
        self.data[base as usize..]
            .iter()
            .copied()
            .take_while(|&word| word != 0)
    }

    /// Copy `words` into memory starting at `origin`. Words which would fall past the end of
    /// memory are dropped.
    pub fn load(&mut self, origin: u16, words: &[u16]) {
        let start = origin as usize;
        let count = words.len().min(MEMORY_MAX - start);
        self.data[start..start + count].copy_from_slice(&words[..count]);
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::BufferTerminal;

    #[test]
    fn keyboard_status_without_input() {
        let mut mem = Memory::new();
        let mut term = BufferTerminal::new();
        mem.write(KBSR, 0x1234);
        assert_eq!(mem.read(KBSR, &mut term).unwrap(), 0);
    }

    #[test]
    fn keyboard_status_consumes_input_once() {
        let mut mem = Memory::new();
        let mut term = BufferTerminal::with_input("A");

        let status = mem.read(KBSR, &mut term).unwrap();
        assert_ne!(status & 0x8000, 0);
        assert_eq!(mem.read(KBDR, &mut term).unwrap(), b'A' as u16);

        // No new input
        assert_eq!(mem.read(KBSR, &mut term).unwrap(), 0);
        // Data register keeps the last key
        assert_eq!(mem.read(KBDR, &mut term).unwrap(), b'A' as u16);
    }

    #[test]
    fn data_register_read_does_not_poll() {
        let mut mem = Memory::new();
        let mut term = BufferTerminal::with_input("x");
        assert_eq!(mem.read(KBDR, &mut term).unwrap(), 0);
        assert!(term.poll_input_available().unwrap());
    }

    #[test]
    fn device_writes_are_plain() {
        let mut mem = Memory::new();
        let mut term = BufferTerminal::new();
        mem.write(KBDR, 0x0041);
        assert_eq!(mem.get(KBDR), 0x0041);
        assert_eq!(mem.read(KBDR, &mut term).unwrap(), 0x0041);
    }

    #[test]
    fn load_truncates_at_end_of_memory() {
        let mut mem = Memory::new();
        mem.load(0xFFFE, &[1, 2, 3, 4]);
        assert_eq!(mem.get(0xFFFE), 1);
        assert_eq!(mem.get(0xFFFF), 2);
        // Nothing wrapped around
        assert_eq!(mem.get(0x0000), 0);
        assert_eq!(mem.get(0x0001), 0);
    }

    #[test]
    fn string_stops_at_zero_or_end() {
        let mut mem = Memory::new();
        mem.load(0x4000, &[b'h' as u16, b'i' as u16, 0, b'x' as u16]);
        assert_eq!(
            mem.string_from(0x4000).collect::<Vec<_>>(),
            [b'h' as u16, b'i' as u16]
        );

        mem.load(0xFFFE, &[1, 2]);
        assert_eq!(mem.string_from(0xFFFE).collect::<Vec<_>>(), [1, 2]);
    }
}
