//! Protocol senders: stateless Art-Net UDP and stateful sACN UDP.

pub mod artnet;
pub mod sacn;
