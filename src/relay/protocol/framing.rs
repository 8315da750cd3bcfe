use super::{FrameError, HEADER_LEN, MsgType, PROTO_VERSION, ProtoError};
use byteorder::{BigEndian, ByteOrder};
use std::io::{self, Read, Write};

/// Write a single frame: [ver][type][reserved u16=0][len u32][body...]
pub fn write_frame<W: Write>(w: &mut W, msg_type: MsgType, body: &[u8]) -> io::Result<()> {
    let mut header = [0u8; HEADER_LEN];
    encode_header(&mut header, msg_type, body.len())?;
    w.write_all(&header)?;
    w.write_all(body)?;
    w.flush()?;
    Ok(())
}

/// Read a single frame, enforcing a max body length.
pub fn read_frame<R: Read>(r: &mut R, max_body: usize) -> Result<(MsgType, Vec<u8>), FrameError> {
    let mut header = [0u8; HEADER_LEN];

    r.read_exact(&mut header)?; // io::Error -> FrameError::Io

    let (msg_type, len) = parse_header(&header, max_body)?;

    let mut body = vec![0u8; len];
    r.read_exact(&mut body)?;

    Ok((msg_type, body))
}

fn encode_header(header: &mut [u8; HEADER_LEN], msg_type: MsgType, len: usize) -> io::Result<()> {
    let len = u32::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "body too large"))?;
    header[0] = PROTO_VERSION;
    header[1] = msg_type.as_u8();
    BigEndian::write_u16(&mut header[2..4], 0);
    BigEndian::write_u32(&mut header[4..8], len);
    Ok(())
}

fn parse_header(header: &[u8], max_body: usize) -> Result<(MsgType, usize), ProtoError> {
    if header[0] != PROTO_VERSION {
        return Err(ProtoError::InvalidFormat("bad proto version"));
    }
    let msg_type = MsgType::from_u8(header[1])?;
    // flags ignored for now
    let len = BigEndian::read_u32(&header[4..8]) as usize;
    if len > max_body {
        return Err(ProtoError::TooLarge);
    }
    Ok((msg_type, len))
}

/// Incremental frame decoder for transports that cannot block in
/// `read_exact` (the TLS connection loop polls with a read timeout).
///
/// Feed whatever bytes arrived with [`push`](Self::push), then drain complete
/// frames with [`next_frame`](Self::next_frame). A header error poisons the
/// stream: framing cannot be recovered once a length is untrusted.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_body: usize,
}

impl FrameDecoder {
    pub fn new(max_body: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_body,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes received but not yet returned as part of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn next_frame(&mut self) -> Result<Option<(MsgType, Vec<u8>)>, ProtoError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let (msg_type, len) = parse_header(&self.buf[..HEADER_LEN], self.max_body)?;
        let total = HEADER_LEN + len;
        if self.buf.len() < total {
            return Ok(None);
        }
        let body = self.buf[HEADER_LEN..total].to_vec();
        self.buf.drain(..total);
        Ok(Some((msg_type, body)))
    }
}
