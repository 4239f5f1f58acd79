//! Human-diffable text format for archetype assets.
//!
//! A document starts with the asset's type tag and lists every member, one
//! `key: value` per line, nested by indentation. Container items are keyed
//! by their item id (`<id>~<key>` for dictionaries); a trailing `*` marks a
//! local override and `!` a sealed one. Derived assets end with a `~Base`
//! block embedding the asset they inherit from.
//!
//! ```text
//! !MyAsset2
//! Id: 00000000-0000-0000-0000-000000000000
//! MyStrings:
//!     0a0000000a0000000a0000000a000000*: MyDerivedString
//!     14000000140000001400000014000000: String2
//! ~Base:
//!     Location: MyAsset
//!     Asset: !MyAsset2
//!         Id: 00000000-0000-0000-0000-000000000000
//!         MyStrings:
//!             0a0000000a0000000a0000000a000000: String1
//!             14000000140000001400000014000000: String2
//! ```

pub mod error;
mod keys;
mod lexer;
pub mod parser;
pub mod reader;
mod scalar;
pub mod settings;
pub mod writer;

pub use error::{Result, TextError};
pub use reader::{deserialize, read_from};
pub use settings::Settings;
pub use writer::{serialize, write_to};
