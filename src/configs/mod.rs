pub mod base;
pub mod media;
pub mod server;
pub mod voice;

pub use base::*;
pub use media::*;
pub use server::*;
pub use voice::*;
