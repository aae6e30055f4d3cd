mod classifier;
mod controller;
mod tunnel_session;
mod writer;

pub use classifier::{classify_packet, DropReason, PacketAction};
pub use controller::SessionController;
pub use tunnel_session::TunnelSession;
pub use writer::PacketWriter;
