pub mod stdio;

pub use stdio::{serve, serve_stdio, StdioRequest, StdioResponse};
