pub mod hex;

pub use hex::hexdump;
