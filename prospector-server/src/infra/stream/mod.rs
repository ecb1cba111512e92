pub mod session;

pub use session::{KEEP_ALIVE_TEXT, StreamSession, frame_to_sse, keep_alive, sse_events};
