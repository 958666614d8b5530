mod identify;
mod resume;
mod select_protocol;

pub use self::identify::Identify;
pub use self::resume::Resume;
pub use self::select_protocol::{SelectProtocol, SelectProtocolData, UDP_PROTOCOL};
