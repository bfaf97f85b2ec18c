//! Splitting a raw command line into the launcher's own name and the tail.
//!
//! Some platforms hand a program its whole invocation as a single string
//! instead of a pre-split argument vector. To pass the target's arguments on
//! untouched we only need to know where our own name ends; everything after
//! it is forwarded byte-for-byte, so no unquoting happens here.
//!
//! The rules mirror how the first token of such a line is delimited:
//!
//! - leading spaces are skipped
//! - `"` toggles quoting, and a space only ends the token outside quotes
//! - `\` makes the next unit literal (it neither toggles quoting nor ends the
//!   token)
//! - spaces after the token are skipped, so the offset lands on the first
//!   unit of the tail, or on the terminator when there is none

const NUL: u32 = 0;
const SPACE: u32 = b' ' as u32;
const QUOTE: u32 = b'"' as u32;
const BACKSLASH: u32 = b'\\' as u32;

/// A single unit of a command line: a UTF-8 byte, a UTF-16 code unit, or a
/// `char`.
///
/// All delimiters are ASCII, so scanning UTF-8 bytewise never lands inside a
/// multi-byte sequence.
pub trait CodeUnit: Copy {
    fn code(self) -> u32;
}

impl CodeUnit for u8 {
    fn code(self) -> u32 {
        u32::from(self)
    }
}

impl CodeUnit for u16 {
    fn code(self) -> u32 {
        u32::from(self)
    }
}

impl CodeUnit for char {
    fn code(self) -> u32 {
        u32::from(self)
    }
}

/// Returns the offset of the first unit of the second token in `line`.
///
/// The end of the slice and an embedded NUL both act as the terminator; if
/// the first token runs into it, the returned offset points at it and the
/// tail is empty. Single pass, no allocation.
pub fn tail_offset<C: CodeUnit>(line: &[C]) -> usize {
    let unit = |index: usize| line.get(index).map_or(NUL, |c| c.code());

    let mut index = 0;
    while unit(index) == SPACE {
        index += 1;
    }

    let mut escaping = false;
    let mut quoting = false;
    loop {
        let current = unit(index);
        if current == NUL {
            return index;
        }

        if escaping {
            escaping = false;
        } else if current == QUOTE {
            quoting = !quoting;
        } else if current == BACKSLASH {
            escaping = true;
        } else if current == SPACE && !quoting {
            break;
        }
        index += 1;
    }

    while unit(index) == SPACE {
        index += 1;
    }
    index
}

/// The part of `line` after the launcher's own name, exactly as written.
pub fn tail(line: &str) -> &str {
    // Delimiters are ASCII, so the byte offset is always a char boundary.
    &line[tail_offset(line.as_bytes())..]
}

/// [`tail`] for UTF-16 command lines.
pub fn wide_tail(line: &[u16]) -> &[u16] {
    let end = line.iter().position(|&c| c == 0).unwrap_or(line.len());
    &line[tail_offset(line)..end]
}
