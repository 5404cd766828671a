#![doc = include_str!("../README.md")]
//!

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(any(), deny(clippy::unwrap_used))]

pub mod model;
pub mod signature;

pub use model::{Mode, SubscribeRequest, Subscription, UnsubscribeRequest};
pub use signature::{sign, validate_signature, SignatureAlgorithm, SIGNATURE_HEADER};
