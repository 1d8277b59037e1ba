mod memory;
mod traits;

#[cfg(feature = "disk-storage")]
mod disk;

pub use memory::*;
pub use traits::*;

#[cfg(feature = "disk-storage")]
pub use disk::*;
