//! Wire codec primitives: Art-Net, sACN, the ACN root layer, RDM, and the
//! RDMnet payloads layered over the root PDU.

pub mod acn_root;
pub mod artnet;
pub mod rdm;
pub mod rdmnet;
pub mod sacn;

/// RDMnet root-layer vectors, used to pick which payload codec to dispatch
/// a drained [`acn_root::RootPacket`] to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum RootVector {
    Broker = 1,
    Rpt = 2,
    Ept = 3,
    Llrp = 4,
}

impl RootVector {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(RootVector::Broker),
            2 => Some(RootVector::Rpt),
            3 => Some(RootVector::Ept),
            4 => Some(RootVector::Llrp),
            _ => None,
        }
    }
}
