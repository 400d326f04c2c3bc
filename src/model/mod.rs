pub mod address;
pub mod key_info;
pub mod signature;

pub use address::Address;
pub use key_info::{KeyInfo, KeyType, ParseKeyTypeError};
pub use signature::{MsgMeta, MsgType, SigType, Signature};
