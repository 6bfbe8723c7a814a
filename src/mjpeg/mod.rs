pub mod error;
pub mod frame;
pub mod http_source;
pub mod source;
pub mod splitter;
pub mod traits;

pub use error::{CaptureError, FormatError, TransportError};
pub use frame::JpegFrame;
pub use splitter::{FrameSplitter, ParserState};
