//! Wire types for the shardstream update stream.
//!
//! The [`binlogdata`] module is checked-in `tonic-build` output for
//! `proto/binlogdata.proto` (client side only; the server lives with the
//! source shard). Regenerate with the `generate` feature after editing the
//! proto.
#![allow(clippy::large_enum_variant)]

pub mod binlogdata;
