//! KQL ("kuery") parsing and lowering
//!
//! ```
//! use quarry_query::kuery::{KueryNode, parse};
//!
//! let ast = parse("status:500 and not service:cart").unwrap();
//! assert!(matches!(ast, KueryNode::Function { .. }));
//! ```

mod ast;
mod lexer;
mod parser;
mod to_dsl;

#[cfg(test)]
mod to_dsl_test;

pub use ast::{
    FunctionName, KueryNode, Literal, LiteralValue, RangeNode, RangeOperator, Wildcard,
    WildcardPart, escape_query_string,
};
pub use parser::{MAX_NESTING_DEPTH, ParseOptions, parse, parse_with_options};
pub use to_dsl::to_structured_query;
