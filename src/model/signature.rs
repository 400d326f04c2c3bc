use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SigType {
    Secp256k1,
    Ed25519,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub sig_type: SigType,
    #[serde_as(as = "Hex")]
    pub data: Vec<u8>,
}

/// What is being signed. Backends may use it to display or police signing requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MsgType {
    #[default]
    Unknown,
    ChainMsg,
    Block,
}

/// Metadata passed along with a signing request.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMeta {
    pub msg_type: MsgType,
    /// Extra context for the signer, eg. the unsigned message a digest was computed from.
    #[serde_as(as = "Hex")]
    pub extra: Vec<u8>,
}

impl MsgMeta {
    pub fn new(msg_type: MsgType) -> Self {
        Self {
            msg_type,
            extra: Vec::new(),
        }
    }
}
