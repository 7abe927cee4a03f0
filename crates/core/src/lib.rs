// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

//! Memoizing document compilation for folio.
//!
//! This crate turns source documents into HTML by running an external
//! renderer once per document, skipping documents whose output already exists.
//!
//! # Key Types
//!
//! - [`Target`]: a named document with derived source and output paths
//! - [`ArtifactCache`]: decides whether a target's output is fresh
//! - [`ProcessRunner`]: runs the renderer with output captured to a [`LogSink`]
//! - [`TaskExecutor`]: cache check, render, classify into a [`CompilationResult`]
//! - [`BuildPlan`]: dependency levels for multi-target builds
//! - [`Manifest`]: the `folio.toml` project configuration
//!
//! # Example
//!
//! ```ignore
//! use folio_core::{ExecutorConfig, Target, TaskExecutor};
//!
//! let executor = TaskExecutor::new(ExecutorConfig::default());
//! let result = executor.compile(&Target::new("intro", "Rmd")?).await?;
//! ```

pub mod cache;
mod error;
pub mod executor;
pub mod manifest;
pub mod outcome;
pub mod plan;
pub mod runner;
mod target;

pub use cache::{ArtifactCache, ArtifactStore, FreshnessPolicy, FsStore, MemoryStore};
pub use error::{Error, Result};
pub use executor::{ExecutorConfig, FailurePolicy, TaskExecutor};
pub use manifest::{MANIFEST_FILE, Manifest};
pub use outcome::{BuildReport, CompilationResult, ReportEntry, TargetOutcome};
pub use plan::BuildPlan;
pub use runner::{ExitOutcome, LogSink, ProcessRunner, RenderCommand, SubprocessRunner};
pub use target::{OUTPUT_EXTENSION, Target};
