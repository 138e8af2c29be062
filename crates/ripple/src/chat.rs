//! Client side of a streamed chat: a session that sends the conversation, folds the
//! streamed response back into it and decides when to send it again.
pub mod callbacks;
pub mod options;
pub mod partial_json;
pub mod reconcile;
pub mod roundtrip;
pub mod session;
pub mod state;
pub mod transport;

pub use callbacks::{ChatCallbacks, NoCallbacks};
pub use options::{ChatOptions, RequestOptions};
pub use reconcile::{Flow, Reconciler};
pub use roundtrip::RoundtripController;
pub use session::{ChatSession, Outcome, StopHandle};
pub use state::{ChatState, Phase};
pub use transport::{ByteStream, ChatTransport, HttpTransport};
