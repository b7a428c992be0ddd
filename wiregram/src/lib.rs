// SPDX-License-Identifier: MIT OR Apache-2.0

//! A library for building, inspecting and decoding network protocol
//! packets.
//!
//! Every protocol is implemented twice over the same wire format:
//!
//! * an owned *layer* type ([`layers::tcp::Tcp`], [`layers::dns::Dns`],
//!   ...) holding intended field values, used to construct packets -
//!   lengths, protocol numbers and checksums left unset are derived
//!   automatically when the layer stack is serialized by
//!   [`packet::PacketBuilder`];
//! * a `*Ref` view type ([`layers::tcp::TcpRef`], ...) interpreting a
//!   byte slice in place, used to inspect captured packets - parsing
//!   never fails outright, and [`packet::Packet::is_valid`] reports
//!   separately whether the bytes form a coherent stack.
//!
//! ```
//! use std::time::SystemTime;
//!
//! use wiregram::layer_stack;
//! use wiregram::addr::{Ipv4Address, MacAddress};
//! use wiregram::layers::ip::Ipv4;
//! use wiregram::layers::l2::Ether;
//! use wiregram::layers::tcp::{Tcp, TcpFlags, TcpRef};
//! use wiregram::packet::PacketBuilder;
//!
//! let ether = Ether::new(MacAddress([0, 0, 1, 0, 0, 0]), MacAddress([0xFE; 6]));
//! let ipv4 = Ipv4::new(
//!     "10.0.0.1".parse::<Ipv4Address>().unwrap(),
//!     "10.0.0.2".parse::<Ipv4Address>().unwrap(),
//!     64,
//! );
//! let mut tcp = Tcp::new(49152, 80);
//! tcp.set_flags(TcpFlags::SYN);
//!
//! let packet = PacketBuilder::build(
//!     SystemTime::now(),
//!     layer_stack![ether, ipv4, tcp],
//! )
//! .unwrap();
//!
//! assert!(packet.is_valid());
//! assert_eq!(packet.get_layer::<TcpRef>().unwrap().dport(), 80);
//! ```

#![allow(clippy::len_without_is_empty)]

pub mod addr;
pub mod error;
pub mod layers;
pub mod packet;
pub mod prelude;
pub mod utils;
