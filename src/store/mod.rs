pub mod atomic;
pub mod digest;

pub use atomic::replace_file;
pub use digest::sha256_hex;
