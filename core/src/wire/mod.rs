//! Wire framing (spec §6): a fixed-size, length-prefixed binary frame
//! replacing the original pipe-delimited `net_info|msg_type|payload` string
//! join (Design Notes, "string-delimited framing").

mod frame;
mod netinfo;
pub mod padding;

pub use frame::{Frame, FrameError, FRAME_SIZE, MAX_FRAME_PAYLOAD};
pub use netinfo::{NetInfo, UnknownNetInfo};
