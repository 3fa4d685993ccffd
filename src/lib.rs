#![allow(clippy::enum_variant_names)]

//! A small RAM filesystem that is assembled on a host, stored as one flat
//! image and read back later, possibly by a loader without an allocator.

pub mod codec;
pub mod config;
pub mod ext;
pub mod filesystem;
