//! Inbound message parsing.

mod event;
mod nom_parser;

pub use self::event::{parse_line, EventKind, Origin, ParsedEvent};
pub use self::nom_parser::SplitLine;
