//! RDMnet (E1.33) payload codecs layered over the ACN root PDU.

pub mod broker;
pub mod ept;
pub mod llrp;
pub mod rpt;
