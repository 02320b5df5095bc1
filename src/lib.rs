//! # Chatcrypt.
//!
//! End-to-end encryption and Autocrypt peer-trust core for
//! chat-over-email systems.
//!
//! The crate implements the [Autocrypt Level 1](https://autocrypt.org/level1.html)
//! protocol on top of ordinary RFC 5322 email: the `Autocrypt:` header
//! codec, the per-peer state machine tracking keys and encryption
//! preferences, the PGP/MIME encryption and decryption pipelines
//! including key gossip, and the Autocrypt Setup Message used to move
//! the own private key between devices.
//!
//! Network I/O, the chat database and the UI are *not* part of this
//! crate; they talk to it through [context::Context].

#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::correctness,
    missing_debug_implementations,
    clippy::wildcard_imports,
    clippy::needless_borrow,
    clippy::cast_lossless
)]

#[macro_use]
pub mod log;

pub mod aheader;
pub mod config;
pub mod context;
pub mod decrypt;
pub mod e2ee;
pub mod events;
pub mod headerdef;
pub mod imex;
pub mod key;
pub mod keyring;
pub mod mimefactory;
pub mod mimeparser;
pub mod peerstate;
pub mod pgp;
pub mod sql;
pub mod stock_str;
pub mod tools;

#[cfg(test)]
mod test_utils;
