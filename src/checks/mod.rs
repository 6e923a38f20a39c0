// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Statistical test algorithms. Each submodule owns one test family's
//! parameters, scoring function, and unit tests; [`crate::battery`] wires
//! concrete parameterisations into named [`crate::battery::TestDescriptor`]s.

pub mod birthday;
pub mod collision;
pub mod common;
pub mod frequency;
pub mod gap;
pub mod hamming;
pub mod linearcomp;
pub mod matrixrank;
