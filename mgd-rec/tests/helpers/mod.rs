//! Test Helper Utilities
//!
//! Shared utilities for mgd-rec integration tests

#![allow(dead_code, unused_imports)]

pub mod audio_generator;
pub mod catalog_utils;
pub mod observer;

pub use audio_generator::{generate_test_wav, generate_wav_bytes, ToneConfig};
pub use catalog_utils::{create_test_catalog, seed_entries, synthetic_entry, SlowScanCatalog};
pub use observer::CountingObserver;
