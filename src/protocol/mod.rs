pub mod packet;
pub mod params;
pub mod primitive;
pub mod response;
pub mod r#trait;


pub use params::ParameterList;
pub use r#trait::ResultHandler;
pub use r#trait::params::Params;
