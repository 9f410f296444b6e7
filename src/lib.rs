// Module naming follows project convention (CamelCase component directories)
#[allow(non_snake_case)]
pub mod Core;

#[allow(non_snake_case)]
pub mod Channel;

#[allow(non_snake_case)]
pub mod Wire;

#[allow(non_snake_case)]
pub mod Runtime;

#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub use Channel::{ChannelBuilder, Frame, GuestSender, HostReceiver, Transport};
pub use Core::{RuntimeConfig, RuntimeError};
pub use Runtime::{EventHooks, Reply, RuntimeBuilder};
pub use Wire::{msg_type, ScalarValue};
