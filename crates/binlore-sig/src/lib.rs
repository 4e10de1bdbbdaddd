//! Magic-signature rule engine: the signature DSL parser, expression
//! evaluator, match kernel, rule interpreter, scanner driver, and plugin bus.

pub mod block;
pub mod expr;
pub mod interp;
pub mod kernel;
pub mod model;
pub mod parse;
pub mod parse_support;
pub mod plugin;
pub mod printf;
pub mod scanner;

pub use binlore_common::Error;
pub use block::{BlockSource, OpenOptions, Whence};
pub use model::{Condition, DataType, Endian, ExprOrInt, IntWidth, Line, MagicPattern, Operator, Signature, Value};
pub use parse::{apply_title_filters, parse_signatures};
pub use plugin::{Plugin, PluginBus};
pub use scanner::{scan_file, ScanOptions};
