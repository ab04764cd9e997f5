//! Structure discovery for vendor documentation trees.
//!
//! Each vendor publishes its table of contents differently: as the directory
//! layout itself, as XML manifests, or as HTML definition lists referenced
//! from an XML book configuration. The adapters in this crate turn all three
//! into one [`DocNode`](docbuilder_shared::DocNode) tree with fixed sibling
//! indices, and hand node content to the Markdown converter.

pub mod adapters;
pub mod xml;

pub use adapters::{
    Content, DirectoryAdapter, HtmlTocAdapter, StructureAdapter, XmlManifestAdapter, adapter_for,
};
pub use xml::XmlElement;
