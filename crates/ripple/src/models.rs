//! These models represent the objects exchanged between a chat client and the server
//! that streams responses back to it.
//!
//! The same shapes show up in several places:
//! - the request body a client posts (`ChatRequest`)
//! - the conversation state the client keeps and mutates while a response streams in
//! - the arguments and results of tool invocations that travel on the data stream
//!
//! Field names serialize in camelCase so they line up with what browser-side chat
//! clients send and expect.
pub mod message;
pub mod request;
pub mod role;
pub mod tool;
