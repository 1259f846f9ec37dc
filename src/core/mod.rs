// Core modules: identifier rules, delimited I/O, inference, row mapping and table runtime.
pub mod context;
pub mod delimited;
pub mod error;
pub mod files;
pub mod ident;
pub mod infer;
pub mod intern;
pub mod model;
pub mod row;
pub mod table;
