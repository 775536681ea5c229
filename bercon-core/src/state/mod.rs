pub mod connection;
mod exchange;

pub use connection::ConnectionPhase;
pub use exchange::Exchange;
