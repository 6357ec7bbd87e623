mod command;
mod http;

pub use command::CommandGenerator;
pub use http::HttpGenerator;
