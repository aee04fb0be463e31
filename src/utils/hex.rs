//! Hexdump formatting for the `dump` subcommand.

const COLS: usize = 16;

/// Classic offset / hex / printable-ASCII gutter rendering.
pub fn hexdump(buf: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in buf.chunks(COLS).enumerate() {
        out.push_str(&format!("{:06x}: ", row * COLS));
        for col in 0..COLS {
            match chunk.get(col) {
                Some(b) => out.push_str(&format!("{b:02x} ")),
                None => out.push_str("   "),
            }
        }
        out.push(' ');
        for &b in chunk {
            out.push(if (0x20..=0x7e).contains(&b) {
                b as char
            } else {
                '.'
            });
        }
        out.push('\n');
    }
    out
}
