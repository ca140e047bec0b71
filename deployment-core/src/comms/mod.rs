pub mod address;
pub mod builder;
pub mod transport;
pub(crate) mod transports;

pub use address::Address;
pub use builder::{bind_inbox, bind_outbox, connect_inbox, connect_outbox, memory_channel};
pub use transport::{Frame, TransportClosed, TransportInput, TransportOutput};
