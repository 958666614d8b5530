mod hello;
mod ready;
mod session_description;

pub use self::hello::Hello;
pub use self::ready::Ready;
pub use self::session_description::SessionDescription;
