//! Resource-definition hierarchy and script generation for a cloud
//! resource-management REST explorer.
//!
//! A flat operation catalog (verb + URL template + schemas) is folded into a
//! [`definitions::DefinitionTable`], browsed through a lazily expanded
//! [`tree::ResourceTree`], and a selected node is rendered as CLI,
//! PowerShell and Ansible scripts by the [`script`] generators.

pub mod config;
pub mod definitions;
pub mod docs;
pub mod normalize;
pub mod operation;
pub mod proxy;
pub mod script;
pub mod search;
pub mod tree;
pub mod url_parser;

pub use definitions::{Action, ActionTag, Children, DefinitionTable, ResourceDefinition};
pub use operation::{HttpMethod, OperationDescriptor};
pub use proxy::{ArmProxy, HttpProxy};
pub use script::{Selection, SupportedCommand};
pub use tree::ResourceTree;
