//! Native modules registered on the snippet engines
//!
//! Each submodule provides functions under `gx::*`

pub mod host;
