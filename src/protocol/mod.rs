pub mod events;
pub mod frames;
pub mod opcodes;
pub mod tracks;

pub use events::*;
pub use frames::*;
pub use opcodes::*;
pub use tracks::*;
