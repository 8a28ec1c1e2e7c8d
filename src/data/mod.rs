//! Data module: patch dictionaries and coupling settings

pub mod dict;

pub use dict::{AmiMethod, CouplingSettings, PatchDict, TransformKind};
