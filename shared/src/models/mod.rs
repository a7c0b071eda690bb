//! Domain models shared between the server and its clients.

pub mod courier;
pub mod notification;
pub mod order;
pub mod shift;
