pub mod address;
pub mod constants;
pub mod conversions;
pub mod logger;
pub mod options;
pub mod rust_util;
pub mod test_util;

pub use self::address::Address;
pub use self::address::ObjectReference;
