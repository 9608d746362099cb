//! Domain types and the ports the engine talks to.

pub mod account;
pub mod fee;
pub mod payment;
pub mod ports;
pub mod subscription;
