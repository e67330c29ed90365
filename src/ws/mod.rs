pub mod server;
pub mod session;
