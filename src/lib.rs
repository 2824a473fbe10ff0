pub mod col;
pub mod constant;
pub mod error;
pub mod handler;
mod opts;
pub mod protocol;
pub mod raw;
pub mod result;
pub mod row;
pub mod sync;
pub mod value;

pub use error::{Error, Result};
pub use opts::{HostSpec, Opts, Properties, URL_PREFIX, parse_max_result_buffer, parse_url};
pub use result::{QueryResult, ResultSet};
pub use value::Value;
