//! gxscript - the GXScript line-oriented script language and its foreign
//! snippet engines

pub mod config;
pub mod files;
pub mod host;
pub mod script;
pub mod scripting;
