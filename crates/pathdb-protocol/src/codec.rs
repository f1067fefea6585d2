use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{MetaMessage, MAX_MESSAGE_SIZE};

/// Length of the frame header: 4-byte big-endian length, 1-byte tag.
const HEADER_LEN: usize = 5;

/// Codec for encoding/decoding metadata protocol messages.
pub struct MetaCodec;

impl MetaCodec {
    /// Encode a message with framing: [4 bytes len][1 byte tag][payload]
    ///
    /// The length counts the tag byte plus the payload.
    pub fn encode(msg: &MetaMessage) -> ProtocolResult<Vec<u8>> {
        let payload = Self::encode_payload(msg)?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let len = (payload.len() + 1) as u32;
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode(data: &[u8]) -> ProtocolResult<(MetaMessage, usize)> {
        let &[a, b, c, d, tag, ..] = data else {
            return Err(ProtocolError::FramingError("too short".into()));
        };
        let len = frame_len([a, b, c, d])?;
        let total = 4 + len;
        if data.len() < total {
            return Err(ProtocolError::FramingError(format!(
                "incomplete: have {}, need {}",
                data.len(),
                total
            )));
        }
        let msg = Self::decode_tagged(tag, &data[HEADER_LEN..total])?;
        Ok((msg, total))
    }

    /// Encode payload only (no framing).
    pub fn encode_payload(msg: &MetaMessage) -> ProtocolResult<Vec<u8>> {
        bincode::serialize(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Decode payload only (no framing).
    pub fn decode_payload(data: &[u8]) -> ProtocolResult<MetaMessage> {
        bincode::deserialize(data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// Write one framed message to `writer` and flush it.
    pub async fn write_message<W>(writer: &mut W, msg: &MetaMessage) -> ProtocolResult<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = Self::encode(msg)?;
        writer.write_all(&frame).await?;
        writer.flush().await?;
        trace!(kind = msg.type_name(), bytes = frame.len(), "wrote frame");
        Ok(())
    }

    /// Read one framed message from `reader`.
    ///
    /// Returns `Ok(None)` if the peer closed the stream cleanly before a new
    /// frame started. A stream that ends mid-frame is an error.
    pub async fn read_message<R>(reader: &mut R) -> ProtocolResult<Option<MetaMessage>>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; HEADER_LEN];
        let first = reader.read(&mut header).await?;
        if first == 0 {
            return Ok(None);
        }
        reader.read_exact(&mut header[first..]).await?;

        let [a, b, c, d, tag] = header;
        let len = frame_len([a, b, c, d])?;
        let mut payload = vec![0u8; len - 1];
        reader.read_exact(&mut payload).await?;
        trace!(tag, bytes = HEADER_LEN + payload.len(), "read frame");
        Self::decode_tagged(tag, &payload).map(Some)
    }

    fn decode_tagged(tag: u8, payload: &[u8]) -> ProtocolResult<MetaMessage> {
        let msg = Self::decode_payload(payload)?;
        if msg.type_tag() != tag {
            return Err(ProtocolError::InvalidMessageType(tag));
        }
        Ok(msg)
    }
}

/// Validate the length word of a frame header.
fn frame_len(bytes: [u8; 4]) -> ProtocolResult<usize> {
    let len = u32::from_be_bytes(bytes) as usize;
    if len < 1 {
        return Err(ProtocolError::FramingError("zero-length frame".into()));
    }
    if len - 1 > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len - 1,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(len)
}
