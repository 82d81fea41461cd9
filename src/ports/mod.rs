pub mod transport_port;

pub use transport_port::TransportPort;
