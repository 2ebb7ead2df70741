//! Sealpipe wire protocol.
//!
//! Types a server and a remote client must agree on to reproduce an
//! encryption call from data alone:
//!
//! - [`PipelineStep`]: one step of a pipeline, with its strict textual
//!   encoding `channel[role:function.index],operation,priority,arity`
//! - [`PipelineDescriptor`]: a complete pipeline plus the route metadata a
//!   client needs (public key, method, parameters, validity window)
//! - [`DescriptorDocument`]: the JSON document served to clients
//! - [`MessageFormat`]: the declared shape of a route's payload
//!
//! The step grammar is a security boundary. Parsing rejects every deviation
//! instead of guessing, so a descriptor cannot smuggle anything the operation
//! whitelist would not see.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod descriptor;
pub mod errors;
pub mod format;
pub mod step;

pub use descriptor::{
    ArgumentSpec, DATA_PURPOSE, DOCUMENT_PURPOSE, DescriptorData, DescriptorDocument,
    INPUT_MESSAGE, INPUT_PUBLIC_KEY, PipelineDescriptor, PUBLIC_KEY_FORMAT,
};
pub use errors::{ProtocolError, Result};
pub use format::{HttpMethod, MessageFormat};
pub use step::{PipelineStep, Role, TargetSelector};
