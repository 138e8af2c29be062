//! The data stream protocol: typed parts multiplexed over one UTF-8 byte stream.
//!
//! Every part occupies exactly one `<prefix>:<json>\n` line, so text fragments, tool call
//! events, side-channel data and status signals can interleave freely. Line order is the
//! only ordering guarantee the protocol gives.
pub mod decoder;
pub mod encoder;
pub mod part;
pub mod stream_data;

pub use decoder::{decode_stream, LineDecoder};
pub use encoder::{encode, encode_stream};
pub use part::{PartKind, StreamPart, StreamStatus};
pub use stream_data::{merge_data, pipe_value, DataStream, StreamData};
