// WhatsApp binary protocol node tree.
//
// Only the `Node` tree type lives here; tokenization and wire (de)serialization
// of the full binary XMPP-like protocol belong to the higher-level messaging
// layer and are out of scope for this crate.

pub mod node;

pub use node::*;
