mod conn;
pub mod connect;
pub mod executor;
pub mod stream;

pub use conn::{Conn, PreparedStatement};
pub use connect::ConnectionFactory;
pub use executor::{MoreResults, QueryExecutor};
pub use stream::{ByteStream, CancelHandle, Transport};
