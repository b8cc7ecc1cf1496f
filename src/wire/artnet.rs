//! Art-Net 4 wire codec: header, opcodes, and builders/parsers for the
//! packets this crate sends and receives.
//!
//! Grounded on `examples/kaelenfae-LXMonitor/src-tauri/src/network/artnet.rs`
//! (opcode table, `ArtPollReply` field layout) and
//! `Trangar-artnet_protocol`'s builder/parser pairing style.

use crate::error::{DmxNetError, Result};
use byteorder::{ByteOrder, LittleEndian};

/// The 8-byte Art-Net identifier every packet starts with.
pub const ARTNET_HEADER: &[u8; 8] = b"Art-Net\0";

/// Protocol version this crate builds and expects (big-endian on the wire).
pub const ARTNET_PROTOCOL_VERSION: u16 = 14;

pub const ARTNET_PORT: u16 = 6454;

/// Art-Net opcodes (spec §6). Variants beyond the spec's table are kept for
/// round-tripping packets this crate doesn't build itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum OpCode {
    Poll = 0x2000,
    PollReply = 0x2100,
    DiagData = 0x2300,
    Command = 0x2400,
    Dmx = 0x5000,
    Nzs = 0x5100,
    Sync = 0x5200,
    Address = 0x6000,
    Input = 0x7000,
    TodRequest = 0x8000,
    TodData = 0x8100,
    TodControl = 0x8200,
    Rdm = 0x8300,
    RdmSub = 0x8400,
    TimeCode = 0x9700,
    TimeSync = 0x9800,
    Trigger = 0x9900,
    IpProg = 0xF800,
    IpProgReply = 0xF900,
}

impl OpCode {
    pub fn from_u16(v: u16) -> Option<Self> {
        use OpCode::*;
        Some(match v {
            0x2000 => Poll,
            0x2100 => PollReply,
            0x2300 => DiagData,
            0x2400 => Command,
            0x5000 => Dmx,
            0x5100 => Nzs,
            0x5200 => Sync,
            0x6000 => Address,
            0x7000 => Input,
            0x8000 => TodRequest,
            0x8100 => TodData,
            0x8200 => TodControl,
            0x8300 => Rdm,
            0x8400 => RdmSub,
            0x9700 => TimeCode,
            0x9800 => TimeSync,
            0x9900 => Trigger,
            0xF800 => IpProg,
            0xF900 => IpProgReply,
            _ => return None,
        })
    }
}

fn write_header(buf: &mut Vec<u8>, opcode: OpCode) {
    buf.extend_from_slice(ARTNET_HEADER);
    buf.extend_from_slice(&(opcode as u16).to_le_bytes());
    buf.extend_from_slice(&ARTNET_PROTOCOL_VERSION.to_be_bytes());
}

/// Validates the common 12-byte header and returns the decoded opcode, or
/// `NotThisProtocol` if the identifier doesn't match, or a range error if
/// the opcode is unrecognised.
fn read_header(buf: &[u8]) -> Result<OpCode> {
    if buf.len() < 12 {
        return Err(DmxNetError::NotThisProtocol);
    }
    if &buf[0..8] != ARTNET_HEADER {
        return Err(DmxNetError::NotThisProtocol);
    }
    let opcode_raw = LittleEndian::read_u16(&buf[8..10]);
    OpCode::from_u16(opcode_raw).ok_or(DmxNetError::NotThisProtocol)
}

/// TalkToMe bitfield for ArtPoll (spec §4.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TalkToMe {
    pub diagnostics: bool,
    pub unicast_diagnostics: bool,
    pub send_on_change: bool,
    pub input_on_change: bool,
    pub ieee: bool,
    pub node_report_on_data: bool,
}

impl TalkToMe {
    pub fn to_byte(self) -> u8 {
        let mut b = 0u8;
        if self.diagnostics {
            b |= 1 << 1;
        }
        if self.unicast_diagnostics {
            b |= 1 << 2;
        }
        if self.send_on_change {
            b |= 1 << 3;
        }
        if self.input_on_change {
            b |= 1 << 4;
        }
        if self.ieee {
            b |= 1 << 5;
        }
        if self.node_report_on_data {
            b |= 1 << 6;
        }
        b
    }

    pub fn from_byte(b: u8) -> Self {
        Self {
            diagnostics: b & (1 << 1) != 0,
            unicast_diagnostics: b & (1 << 2) != 0,
            send_on_change: b & (1 << 3) != 0,
            input_on_change: b & (1 << 4) != 0,
            ieee: b & (1 << 5) != 0,
            node_report_on_data: b & (1 << 6) != 0,
        }
    }
}

/// Builds an ArtPoll packet (14 bytes).
pub fn build_art_poll(flags: TalkToMe, priority: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(14);
    write_header(&mut buf, OpCode::Poll);
    buf.push(flags.to_byte());
    buf.push(priority);
    buf
}

/// A decomposed Art-Net Port-Address: a 1-based universe split into
/// Net (7 bits), Sub-Net (4 bits), Universe (4 bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortAddress {
    pub net: u8,
    pub sub_net: u8,
    pub universe: u8,
}

impl PortAddress {
    /// Decomposes a 1-based universe id into Net/Sub-Net/Universe.
    pub fn from_universe(universe_1based: u16) -> Result<Self> {
        if universe_1based == 0 {
            return Err(DmxNetError::range("universe must be >= 1"));
        }
        let addr = universe_1based - 1;
        if addr > 0x7FFF {
            return Err(DmxNetError::range("universe out of 15-bit Port-Address range"));
        }
        Ok(Self {
            net: ((addr >> 8) & 0x7F) as u8,
            sub_net: ((addr >> 4) & 0x0F) as u8,
            universe: (addr & 0x0F) as u8,
        })
    }

    /// Re-composes the 1-based universe id.
    pub fn to_universe(self) -> u16 {
        (((self.net as u16 & 0x7F) << 8) | ((self.sub_net as u16) << 4) | (self.universe as u16))
            + 1
    }

    /// The wire SubUni byte: Sub-Net in the high nibble, Universe in the low.
    pub fn sub_uni_byte(self) -> u8 {
        (self.sub_net << 4) | (self.universe & 0x0F)
    }

    pub fn from_wire(net: u8, sub_uni: u8) -> Self {
        Self {
            net: net & 0x7F,
            sub_net: (sub_uni >> 4) & 0x0F,
            universe: sub_uni & 0x0F,
        }
    }
}

/// Parameters for building an ArtDmx packet.
#[derive(Debug, Clone)]
pub struct ArtDmxParams<'a> {
    pub universe: u16,
    pub sequence: u8,
    pub physical: u8,
    pub data: &'a [u8],
    /// Overrides the transmitted length; still clamped to `data.len()` and
    /// 512.
    pub length: Option<u16>,
}

/// A decoded ArtDmx packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtDmx {
    pub sequence: u8,
    pub physical: u8,
    pub universe: u16,
    pub length: u16,
    pub data: Vec<u8>,
}

/// Builds an ArtDmx packet: 18 header bytes + up to 512 data bytes.
pub fn build_art_dmx(params: &ArtDmxParams<'_>) -> Result<Vec<u8>> {
    let port = PortAddress::from_universe(params.universe)?;
    let requested = params.length.unwrap_or(params.data.len() as u16) as usize;
    let length = requested.min(params.data.len()).min(512);

    let mut buf = Vec::with_capacity(18 + length);
    write_header(&mut buf, OpCode::Dmx);
    buf.push(params.sequence);
    buf.push(params.physical);
    buf.push(port.sub_uni_byte());
    buf.push(port.net);
    buf.extend_from_slice(&(length as u16).to_be_bytes());
    buf.extend_from_slice(&params.data[..length]);
    Ok(buf)
}

/// Parses an ArtDmx packet. Returns `NotThisProtocol` for a buffer that
/// isn't an Art-Net OpDmx packet at all, or a range error for a
/// truncated/invalid one.
pub fn parse_art_dmx(buf: &[u8]) -> Result<ArtDmx> {
    let opcode = read_header(buf)?;
    if opcode != OpCode::Dmx {
        return Err(DmxNetError::NotThisProtocol);
    }
    if buf.len() < 18 {
        return Err(DmxNetError::range("ArtDmx buffer truncated before header end"));
    }
    let sequence = buf[12];
    let physical = buf[13];
    let sub_uni = buf[14];
    let net = buf[15];
    let length = u16::from_be_bytes([buf[16], buf[17]]);
    if length < 2 || length > 512 {
        return Err(DmxNetError::range(format!(
            "ArtDmx length {length} out of [2,512]"
        )));
    }
    let end = 18 + length as usize;
    if buf.len() < end {
        return Err(DmxNetError::range("ArtDmx buffer truncated in data"));
    }
    let port = PortAddress::from_wire(net, sub_uni);
    Ok(ArtDmx {
        sequence,
        physical,
        universe: port.to_universe(),
        length,
        data: buf[18..end].to_vec(),
    })
}

/// Builds an ArtSync packet (14 bytes: header + two reserved zero bytes).
pub fn build_art_sync() -> Vec<u8> {
    let mut buf = Vec::with_capacity(14);
    write_header(&mut buf, OpCode::Sync);
    buf.extend_from_slice(&[0, 0]);
    buf
}

pub fn parse_art_sync(buf: &[u8]) -> Result<()> {
    let opcode = read_header(buf)?;
    if opcode != OpCode::Sync {
        return Err(DmxNetError::NotThisProtocol);
    }
    Ok(())
}

/// Builds an ArtDiagData packet.
pub fn build_art_diag_data(priority: u8, logical_port: u8, text: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(21 + text.len());
    write_header(&mut buf, OpCode::DiagData);
    buf.push(0); // Filler1
    buf.push(priority);
    buf.push(0); // Filler2
    buf.push(0); // Filler3
    buf.push(logical_port);
    buf.push(0); // Filler4
    buf.push(0); // Filler5
    buf.extend_from_slice(&(text.len() as u16).to_be_bytes());
    buf.extend_from_slice(text);
    buf
}

#[derive(Debug, Clone)]
pub struct ArtDiagData {
    pub priority: u8,
    pub logical_port: u8,
    pub text: Vec<u8>,
}

pub fn parse_art_diag_data(buf: &[u8]) -> Result<ArtDiagData> {
    let opcode = read_header(buf)?;
    if opcode != OpCode::DiagData {
        return Err(DmxNetError::NotThisProtocol);
    }
    if buf.len() < 21 {
        return Err(DmxNetError::range("ArtDiagData buffer truncated"));
    }
    let priority = buf[13];
    let logical_port = buf[16];
    let length = u16::from_be_bytes([buf[19], buf[20]]) as usize;
    let end = 21 + length;
    if buf.len() < end {
        return Err(DmxNetError::range("ArtDiagData text truncated"));
    }
    Ok(ArtDiagData {
        priority,
        logical_port,
        text: buf[21..end].to_vec(),
    })
}

/// Builds an ArtTimeCode packet (19 bytes).
pub fn build_art_time_code(hours: u8, minutes: u8, seconds: u8, frames: u8, frame_type: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(19);
    write_header(&mut buf, OpCode::TimeCode);
    buf.extend_from_slice(&[0, 0]); // Filler1, Filler2
    buf.push(frames);
    buf.push(seconds);
    buf.push(minutes);
    buf.push(hours);
    buf.push(frame_type);
    buf
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtTimeCode {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    pub frame_type: u8,
}

pub fn parse_art_time_code(buf: &[u8]) -> Result<ArtTimeCode> {
    let opcode = read_header(buf)?;
    if opcode != OpCode::TimeCode {
        return Err(DmxNetError::NotThisProtocol);
    }
    if buf.len() < 19 {
        return Err(DmxNetError::range("ArtTimeCode buffer truncated"));
    }
    Ok(ArtTimeCode {
        frames: buf[14],
        seconds: buf[15],
        minutes: buf[16],
        hours: buf[17],
        frame_type: buf[18],
    })
}

/// Builds an ArtCommand (text parameter command) packet.
pub fn build_art_command(esta_manufacturer: u16, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + data.len());
    write_header(&mut buf, OpCode::Command);
    buf.extend_from_slice(&esta_manufacturer.to_le_bytes());
    buf.extend_from_slice(&(data.len() as u16).to_be_bytes());
    buf.extend_from_slice(data);
    buf
}

#[derive(Debug, Clone)]
pub struct ArtCommandData {
    pub esta_manufacturer: u16,
    pub data: Vec<u8>,
}

pub fn parse_art_command(buf: &[u8]) -> Result<ArtCommandData> {
    let opcode = read_header(buf)?;
    if opcode != OpCode::Command {
        return Err(DmxNetError::NotThisProtocol);
    }
    if buf.len() < 16 {
        return Err(DmxNetError::range("ArtCommand buffer truncated"));
    }
    let esta_manufacturer = u16::from_le_bytes([buf[12], buf[13]]);
    let length = u16::from_be_bytes([buf[14], buf[15]]) as usize;
    let end = 16 + length;
    if buf.len() < end {
        return Err(DmxNetError::range("ArtCommand data truncated"));
    }
    Ok(ArtCommandData {
        esta_manufacturer,
        data: buf[16..end].to_vec(),
    })
}

/// Builds an ArtTrigger packet (12 header + 2 filler + 2 Oem + Key + SubKey +
/// up to 512 data bytes).
pub fn build_art_trigger(oem: u16, key: u8, sub_key: u8, data: &[u8]) -> Vec<u8> {
    let len = data.len().min(512);
    let mut buf = Vec::with_capacity(18 + len);
    write_header(&mut buf, OpCode::Trigger);
    buf.extend_from_slice(&[0, 0]); // Filler1, Filler2
    buf.extend_from_slice(&oem.to_be_bytes());
    buf.push(key);
    buf.push(sub_key);
    buf.extend_from_slice(&data[..len]);
    buf
}

#[derive(Debug, Clone)]
pub struct ArtTrigger {
    pub oem: u16,
    pub key: u8,
    pub sub_key: u8,
    pub data: Vec<u8>,
}

pub fn parse_art_trigger(buf: &[u8]) -> Result<ArtTrigger> {
    let opcode = read_header(buf)?;
    if opcode != OpCode::Trigger {
        return Err(DmxNetError::NotThisProtocol);
    }
    if buf.len() < 18 {
        return Err(DmxNetError::range("ArtTrigger buffer truncated"));
    }
    let oem = u16::from_be_bytes([buf[14], buf[15]]);
    let key = buf[16];
    let sub_key = buf[17];
    Ok(ArtTrigger {
        oem,
        key,
        sub_key,
        data: buf[18..].to_vec(),
    })
}

/// Parsed/built ArtPollReply, matching the field layout the teacher's
/// listener parses.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtPollReply {
    pub ip_address: [u8; 4],
    pub port: u16,
    pub version_info: u16,
    pub net_switch: u8,
    pub sub_switch: u8,
    pub oem: u16,
    pub ubea_version: u8,
    pub status1: u8,
    pub esta_manufacturer: u16,
    pub short_name: String,
    pub long_name: String,
    pub node_report: String,
    pub num_ports: u16,
    pub port_types: [u8; 4],
    pub good_input: [u8; 4],
    pub good_output: [u8; 4],
    pub sw_in: [u8; 4],
    pub sw_out: [u8; 4],
    pub style: u8,
    pub mac_address: [u8; 6],
    pub bind_ip: [u8; 4],
    pub bind_index: u8,
    pub status2: u8,
}

impl Default for ArtPollReply {
    fn default() -> Self {
        Self {
            ip_address: [0; 4],
            port: ARTNET_PORT,
            version_info: 0,
            net_switch: 0,
            sub_switch: 0,
            oem: 0,
            ubea_version: 0,
            status1: 0,
            esta_manufacturer: 0,
            short_name: String::new(),
            long_name: String::new(),
            node_report: String::new(),
            num_ports: 0,
            port_types: [0; 4],
            good_input: [0; 4],
            good_output: [0; 4],
            sw_in: [0; 4],
            sw_out: [0; 4],
            style: 0,
            mac_address: [0; 6],
            bind_ip: [0; 4],
            bind_index: 0,
            status2: 0,
        }
    }
}

fn write_fixed_string(buf: &mut Vec<u8>, s: &str, len: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(len.saturating_sub(1));
    buf.extend_from_slice(&bytes[..n]);
    buf.resize(buf.len() + (len - n), 0);
}

fn extract_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).to_string()
}

/// Builds an ArtPollReply packet (213 bytes).
pub fn build_art_poll_reply(reply: &ArtPollReply) -> Vec<u8> {
    let mut buf = Vec::with_capacity(213);
    buf.extend_from_slice(ARTNET_HEADER);
    buf.extend_from_slice(&(OpCode::PollReply as u16).to_le_bytes());
    buf.extend_from_slice(&reply.ip_address);
    buf.extend_from_slice(&reply.port.to_le_bytes());
    buf.extend_from_slice(&reply.version_info.to_be_bytes());
    buf.push(reply.net_switch);
    buf.push(reply.sub_switch);
    buf.extend_from_slice(&reply.oem.to_be_bytes());
    buf.push(reply.ubea_version);
    buf.push(reply.status1);
    buf.extend_from_slice(&reply.esta_manufacturer.to_le_bytes());
    write_fixed_string(&mut buf, &reply.short_name, 18);
    write_fixed_string(&mut buf, &reply.long_name, 64);
    write_fixed_string(&mut buf, &reply.node_report, 64);
    buf.extend_from_slice(&reply.num_ports.to_be_bytes());
    buf.extend_from_slice(&reply.port_types);
    buf.extend_from_slice(&reply.good_input);
    buf.extend_from_slice(&reply.good_output);
    buf.extend_from_slice(&reply.sw_in);
    buf.extend_from_slice(&reply.sw_out);
    buf.resize(200, 0); // reserved Art-Net fields this crate doesn't model
    buf.push(reply.style);
    buf.extend_from_slice(&reply.mac_address);
    buf.extend_from_slice(&reply.bind_ip);
    buf.push(reply.bind_index);
    buf.push(reply.status2);
    buf
}

pub fn parse_art_poll_reply(buf: &[u8]) -> Result<ArtPollReply> {
    let opcode = read_header_poll_reply(buf)?;
    if opcode != OpCode::PollReply {
        return Err(DmxNetError::NotThisProtocol);
    }
    if buf.len() < 213 {
        return Err(DmxNetError::range("ArtPollReply buffer truncated"));
    }
    let mut reply = ArtPollReply::default();
    reply.ip_address.copy_from_slice(&buf[10..14]);
    reply.port = u16::from_le_bytes([buf[14], buf[15]]);
    reply.version_info = u16::from_be_bytes([buf[16], buf[17]]);
    reply.net_switch = buf[18];
    reply.sub_switch = buf[19];
    reply.oem = u16::from_be_bytes([buf[20], buf[21]]);
    reply.ubea_version = buf[22];
    reply.status1 = buf[23];
    reply.esta_manufacturer = u16::from_le_bytes([buf[24], buf[25]]);
    reply.short_name = extract_string(&buf[26..44]);
    reply.long_name = extract_string(&buf[44..108]);
    reply.node_report = extract_string(&buf[108..172]);
    reply.num_ports = u16::from_be_bytes([buf[172], buf[173]]);
    reply.port_types.copy_from_slice(&buf[174..178]);
    reply.good_input.copy_from_slice(&buf[178..182]);
    reply.good_output.copy_from_slice(&buf[182..186]);
    reply.sw_in.copy_from_slice(&buf[186..190]);
    reply.sw_out.copy_from_slice(&buf[190..194]);
    reply.style = buf[200];
    reply.mac_address.copy_from_slice(&buf[201..207]);
    reply.bind_ip.copy_from_slice(&buf[207..211]);
    reply.bind_index = buf[211];
    reply.status2 = buf[212];
    Ok(reply)
}

/// ArtPollReply doesn't carry a protocol-version field (it predates it on
/// the wire in some implementations); only validate the identifier+opcode.
fn read_header_poll_reply(buf: &[u8]) -> Result<OpCode> {
    if buf.len() < 10 {
        return Err(DmxNetError::NotThisProtocol);
    }
    if &buf[0..8] != ARTNET_HEADER {
        return Err(DmxNetError::NotThisProtocol);
    }
    let opcode_raw = LittleEndian::read_u16(&buf[8..10]);
    OpCode::from_u16(opcode_raw).ok_or(DmxNetError::NotThisProtocol)
}

/// Builds an ArtTodRequest, used by the RDM client to solicit an
/// ArtTodData reply (spec §4.6 `getTod`).
pub fn build_art_tod_request(net: u8, addresses: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(23 + addresses.len());
    write_header(&mut buf, OpCode::TodRequest);
    buf.extend_from_slice(&[0, 0]); // Filler1, Filler2
    buf.extend_from_slice(&[0u8; 7]); // Spare1..7
    buf.push(net);
    buf.push(0); // Command: TodFull
    buf.push(addresses.len().min(255) as u8);
    buf.extend_from_slice(&addresses[..addresses.len().min(255)]);
    buf
}

/// A decoded ArtTodData reply: the discovered UID table-of-devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtTodData {
    pub net: u8,
    pub address: u8,
    pub uids: Vec<crate::uid::Uid>,
}

/// Parses an ArtTodData packet: header + net(1) + address(1) +
/// uidTotal(BE16, informational) + blockCount(1) + uidCount(1) +
/// uids(uidCount*6).
pub fn parse_art_tod_data(buf: &[u8]) -> Result<ArtTodData> {
    let opcode = read_header(buf)?;
    if opcode != OpCode::TodData {
        return Err(DmxNetError::NotThisProtocol);
    }
    if buf.len() < 18 {
        return Err(DmxNetError::range("ArtTodData buffer truncated before header end"));
    }
    let net = buf[12];
    let address = buf[13];
    let uid_count = buf[17] as usize;
    let uid_bytes = &buf[18..];
    if uid_bytes.len() < uid_count * 6 {
        return Err(DmxNetError::range("ArtTodData buffer truncated in uid table"));
    }
    let uids = uid_bytes[..uid_count * 6]
        .chunks_exact(6)
        .map(crate::uid::Uid::from_bytes)
        .collect::<Result<Vec<_>>>()?;
    Ok(ArtTodData { net, address, uids })
}

/// Wraps a raw RDM frame (including its leading start code) in an ArtRdm
/// packet, used by `rdmTransaction` (spec §4.6).
pub fn build_art_rdm(net: u8, address: u8, rdm_frame: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + rdm_frame.len());
    write_header(&mut buf, OpCode::Rdm);
    buf.push(0); // RdmVer
    buf.extend_from_slice(&[0u8; 7]); // Filler2..8
    buf.push(net);
    buf.push(0); // Command: Process
    buf.push(address);
    buf.extend_from_slice(rdm_frame);
    buf
}

/// A decoded ArtRdm packet carrying a raw (start-code-prefixed) RDM frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtRdm {
    pub net: u8,
    pub address: u8,
    pub rdm_frame: Vec<u8>,
}

pub fn parse_art_rdm(buf: &[u8]) -> Result<ArtRdm> {
    let opcode = read_header(buf)?;
    if opcode != OpCode::Rdm {
        return Err(DmxNetError::NotThisProtocol);
    }
    if buf.len() < 23 {
        return Err(DmxNetError::range("ArtRdm buffer truncated before header end"));
    }
    let net = buf[20];
    let address = buf[22];
    Ok(ArtRdm {
        net,
        address,
        rdm_frame: buf[23..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_address_round_trips_universe_257() {
        let port = PortAddress::from_universe(257).unwrap();
        assert_eq!(port.net, 1);
        assert_eq!(port.sub_net, 0);
        assert_eq!(port.universe, 0);
        assert_eq!(port.to_universe(), 257);
    }

    #[test]
    fn art_dmx_build_and_parse_scenario() {
        let data = [1u8, 2, 3, 4];
        let params = ArtDmxParams {
            universe: 257,
            sequence: 11,
            physical: 2,
            data: &data,
            length: None,
        };
        let bytes = build_art_dmx(&params).unwrap();
        assert_eq!(bytes.len(), 18 + 4);

        let parsed = parse_art_dmx(&bytes).unwrap();
        assert_eq!(parsed.sequence, 11);
        assert_eq!(parsed.physical, 2);
        assert_eq!(parsed.universe, 257);
        assert_eq!(parsed.length, 4);
        assert_eq!(parsed.data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn art_dmx_length_is_min_of_override_and_data() {
        let data = vec![9u8; 600];
        let params = ArtDmxParams {
            universe: 1,
            sequence: 0,
            physical: 0,
            data: &data,
            length: Some(1000),
        };
        let bytes = build_art_dmx(&params).unwrap();
        assert_eq!(bytes.len(), 18 + 512);
    }

    #[test]
    fn art_dmx_rejects_bad_length() {
        let mut bytes = build_art_dmx(&ArtDmxParams {
            universe: 1,
            sequence: 0,
            physical: 0,
            data: &[1, 2, 3, 4],
            length: None,
        })
        .unwrap();
        // corrupt the length field to 1 (< 2 is invalid)
        bytes[16] = 0;
        bytes[17] = 1;
        assert!(parse_art_dmx(&bytes).is_err());
    }

    #[test]
    fn non_matching_header_is_not_this_protocol() {
        let bytes = vec![0u8; 20];
        assert!(matches!(
            parse_art_dmx(&bytes),
            Err(DmxNetError::NotThisProtocol)
        ));
    }

    #[test]
    fn art_poll_is_14_bytes() {
        let bytes = build_art_poll(TalkToMe::default(), 0x10);
        assert_eq!(bytes.len(), 14);
        assert_eq!(bytes[12], 0);
        assert_eq!(bytes[13], 0x10);
    }

    #[test]
    fn talk_to_me_bit_round_trip() {
        let t = TalkToMe {
            diagnostics: true,
            unicast_diagnostics: false,
            send_on_change: true,
            input_on_change: false,
            ieee: true,
            node_report_on_data: false,
        };
        assert_eq!(TalkToMe::from_byte(t.to_byte()), t);
    }

    #[test]
    fn art_poll_reply_round_trips() {
        let mut reply = ArtPollReply::default();
        reply.ip_address = [10, 0, 0, 5];
        reply.short_name = "node-a".into();
        reply.long_name = "node-a-long-name".into();
        reply.num_ports = 4;
        reply.mac_address = [1, 2, 3, 4, 5, 6];

        let bytes = build_art_poll_reply(&reply);
        let parsed = parse_art_poll_reply(&bytes).unwrap();
        assert_eq!(parsed, reply);
    }

    #[test]
    fn art_time_code_round_trips() {
        let bytes = build_art_time_code(1, 2, 3, 4, 0);
        let tc = parse_art_time_code(&bytes).unwrap();
        assert_eq!(
            tc,
            ArtTimeCode {
                hours: 1,
                minutes: 2,
                seconds: 3,
                frames: 4,
                frame_type: 0
            }
        );
    }

    #[test]
    fn art_trigger_round_trips() {
        let data = vec![7u8; 10];
        let bytes = build_art_trigger(0xFFFF, 1, 2, &data);
        let trig = parse_art_trigger(&bytes).unwrap();
        assert_eq!(trig.oem, 0xFFFF);
        assert_eq!(trig.key, 1);
        assert_eq!(trig.sub_key, 2);
        assert_eq!(trig.data, data);
    }

    #[test]
    fn art_tod_request_has_expected_size() {
        let bytes = build_art_tod_request(0, &[0, 1, 2]);
        assert_eq!(bytes.len(), 27);
    }

    #[test]
    fn art_tod_data_round_trips() {
        use crate::uid::Uid;
        let uids = vec![Uid::new(1, 1), Uid::new(1, 2)];
        let mut buf = Vec::new();
        write_header(&mut buf, OpCode::TodData);
        buf.push(0); // net
        buf.push(0); // address
        buf.extend_from_slice(&(uids.len() as u16).to_be_bytes()); // uidTotal
        buf.push(0); // blockCount
        buf.push(uids.len() as u8); // uidCount
        for u in &uids {
            buf.extend_from_slice(&u.to_bytes());
        }
        let parsed = parse_art_tod_data(&buf).unwrap();
        assert_eq!(parsed.uids, uids);
    }

    #[test]
    fn art_rdm_round_trips() {
        let frame = vec![0xCC, 0x01, 0x10];
        let bytes = build_art_rdm(0, 1, &frame);
        let parsed = parse_art_rdm(&bytes).unwrap();
        assert_eq!(parsed.net, 0);
        assert_eq!(parsed.address, 1);
        assert_eq!(parsed.rdm_frame, frame);
    }
}
