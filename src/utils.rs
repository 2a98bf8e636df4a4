//! Small free-standing helpers shared across modules.

use std::fs::File;
use std::io::Read;

/// Cryptographically-uninteresting randomness used only for pool uuids.
pub fn rand() -> u64 {
    let mut buf = [0u8; 8];
    let mut f = File::open("/dev/urandom").expect("/dev/urandom must be available");
    f.read_exact(&mut buf).expect("failed to read /dev/urandom");
    u64::from_be_bytes(buf)
}

#[macro_export]
macro_rules! log {
    ($tag:expr, $msg:expr $(, $($args:tt)*)?) => {
        #[cfg(feature = "verbose")]
        {
            use term_painter::Color::*;
            use term_painter::ToStyle;
            println!("{:>10}  {}", $tag, Green.paint(format!($msg $(, $($args)*)?)));
        }
    };
}
