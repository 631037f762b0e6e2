//! Command channel: length-prefixed JSON over loopback TCP

pub mod dispatch;
pub mod messages;
pub mod server;
pub mod tcp_receiver;
pub mod wire;

pub use dispatch::CommandService;
pub use messages::{HealthReport, Request, Response, ResponseResult, SchedulerState};
pub use server::{CommandServer, ServerThread};
pub use tcp_receiver::TcpReceiver;
