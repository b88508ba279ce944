//! Frame codecs for both wire protocols.
//!
//! TCP frames are a little-endian `u32` length followed by a bincode body.
//! WebSocket frames are JSON text of the same message enums.

use serde::{Serialize, de::DeserializeOwned};
use std::io::{self, Read, Write};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::errors::{Result, SerializationError};

/// Largest frame body accepted on the TCP transport (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

fn check_size(len: usize) -> io::Result<()> {
    if len > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message size {len} exceeds maximum allowed size of {MAX_MESSAGE_SIZE} bytes"),
        ));
    }
    Ok(())
}

/// Decode a bincode body. Declared lengths inside the body can't make the
/// decoder allocate more than a frame may hold.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let config = bincode::config::standard().with_limit::<MAX_MESSAGE_SIZE>();
    let (value, _) = bincode::serde::decode_from_slice(body, config)?;
    Ok(value)
}

/// Encode a value as a complete frame, length prefix included.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let body = bincode::serde::encode_to_vec(value, bincode::config::standard())?;
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(SerializationError::MessageTooLarge {
            actual: body.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    // Size and body go out in one chunk to prevent read-side EOF races.
    let mut frame = Vec::with_capacity(body.len() + 4);
    frame.extend((body.len() as u32).to_le_bytes());
    frame.extend(body);
    Ok(frame)
}

pub fn encode_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| SerializationError::InvalidFormat(e.to_string()))
}

pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| SerializationError::InvalidFormat(e.to_string()))
}

pub fn read_prefixed<T: DeserializeOwned, R: Read>(reader: &mut R) -> io::Result<T> {
    let mut len_bytes = [0; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    check_size(len)?;

    let mut buf = vec![0; len];
    if let Err(error) = reader.read_exact(&mut buf) {
        let kind = match error.kind() {
            io::ErrorKind::WouldBlock => io::ErrorKind::InvalidData,
            error => error,
        };
        return Err(kind.into());
    }

    decode(&buf).map_err(|_| io::ErrorKind::InvalidData.into())
}

pub fn write_prefixed<T: Serialize, W: Write>(writer: &mut W, value: &T) -> io::Result<()> {
    let frame = encode(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    writer.write_all(&frame)
}

/// One frame read off an async stream.
#[derive(Debug, Eq, PartialEq)]
pub enum Frame {
    /// Undecoded body, so callers can tell a broken connection from a
    /// malformed message.
    Body(Vec<u8>),
    /// The announced body was over [`MAX_MESSAGE_SIZE`]. It was read and
    /// discarded, so the stream is positioned at the next frame.
    Oversized(usize),
}

/// Read one frame.
///
/// # Errors
///
/// Only I/O failures, including the stream ending inside a frame.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Frame> {
    let mut len_bytes = [0; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_MESSAGE_SIZE {
        let mut body = (&mut *reader).take(len as u64);
        let skipped = tokio::io::copy(&mut body, &mut tokio::io::sink()).await?;
        if skipped < len as u64 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        return Ok(Frame::Oversized(len));
    }
    let mut buf = vec![0; len];
    reader.read_exact(&mut buf).await?;
    Ok(Frame::Body(buf))
}

/// Write an already encoded frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, Write},
        net::{Shutdown, TcpListener, TcpStream},
    };

    use super::*;
    use crate::{
        game::entities::{CardCategory, DrawSource, Username},
        net::messages::{ServerMessage, UserCommand},
    };

    fn setup() -> (TcpStream, TcpStream) {
        let server = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (stream, _) = server.accept().unwrap();
        (client, stream)
    }

    #[test]
    fn write_and_read() {
        let (mut client, mut stream) = setup();
        let value = UserCommand::Login(Username::new("ann"));
        assert!(write_prefixed(&mut stream, &value).is_ok());
        assert!(read_prefixed::<UserCommand, TcpStream>(&mut client).is_ok_and(|v| v == value));
    }

    #[test]
    fn write_and_read_in_order() {
        let (mut client, mut stream) = setup();
        let msgs = vec![
            UserCommand::FixCapacity(3),
            UserCommand::DrawCard {
                category: CardCategory::Resource,
                source: DrawSource::FaceUp(1),
            },
            UserCommand::Pong,
        ];
        for msg in &msgs {
            write_prefixed(&mut stream, msg).unwrap();
        }
        for msg in &msgs {
            let received: UserCommand = read_prefixed(&mut client).unwrap();
            assert_eq!(&received, msg);
        }
    }

    #[test]
    fn write_and_read_unexpected_eof() {
        let (mut client, mut stream) = setup();
        let value = "Hello, World!".to_string();
        let buf = value.as_bytes();
        assert!(stream.write_all(&(buf.len() as u32 + 8).to_le_bytes()).is_ok());
        assert!(stream.write_all(buf).is_ok());
        stream.shutdown(Shutdown::Write).unwrap();
        assert_eq!(
            read_prefixed::<String, TcpStream>(&mut client).map_err(|e| e.kind()),
            Err(io::ErrorKind::UnexpectedEof)
        );
    }

    #[test]
    fn reject_oversized_message() {
        let (mut client, mut stream) = setup();
        let malicious_size = 2_000_000_000u32;
        assert!(stream.write_all(&malicious_size.to_le_bytes()).is_ok());
        assert_eq!(
            read_prefixed::<String, TcpStream>(&mut client).map_err(|e| e.kind()),
            Err(io::ErrorKind::InvalidData)
        );
    }

    #[test]
    fn garbage_body_is_invalid_data() {
        let (mut client, mut stream) = setup();
        stream.write_all(&3u32.to_le_bytes()).unwrap();
        stream.write_all(&[0xff, 0xff, 0xff]).unwrap();
        assert_eq!(
            read_prefixed::<ServerMessage, TcpStream>(&mut client).map_err(|e| e.kind()),
            Err(io::ErrorKind::InvalidData)
        );
    }

    #[tokio::test]
    async fn async_frames_match_sync_frames() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let frame = encode(&ServerMessage::Ping).unwrap();
        write_frame(&mut a, &frame).await.unwrap();
        let Frame::Body(body) = read_frame(&mut b).await.unwrap() else {
            panic!("expected a frame body");
        };
        assert_eq!(body.as_slice(), &frame[4..]);
        assert_eq!(decode::<ServerMessage>(&body).unwrap(), ServerMessage::Ping);
    }

    #[tokio::test]
    async fn async_read_skips_oversized_frame() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);
        let len = MAX_MESSAGE_SIZE + 1;
        tokio::spawn(async move {
            a.write_all(&(len as u32).to_le_bytes()).await.unwrap();
            a.write_all(&vec![7; len]).await.unwrap();
            let frame = encode(&ServerMessage::Ping).unwrap();
            write_frame(&mut a, &frame).await.unwrap();
        });

        assert_eq!(read_frame(&mut b).await.unwrap(), Frame::Oversized(len));
        let Frame::Body(body) = read_frame(&mut b).await.unwrap() else {
            panic!("expected the next frame after the skipped one");
        };
        assert_eq!(decode::<ServerMessage>(&body).unwrap(), ServerMessage::Ping);
    }

    #[tokio::test]
    async fn async_read_of_truncated_oversized_frame_is_eof() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, &u32::MAX.to_le_bytes()).await.unwrap();
        drop(a);
        let err = read_frame(&mut b).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn decode_rejects_huge_declared_length() {
        // A login whose name claims to be a terabyte long.
        let mut body = vec![0, 253];
        body.extend((1u64 << 40).to_le_bytes());
        assert!(decode::<UserCommand>(&body).is_err());
    }

    #[test]
    fn json_rejects_unknown_commands() {
        assert!(decode_json::<UserCommand>(r#"{"Bet":10}"#).is_err());
        let text = encode_json(&UserCommand::ChooseObjective(1)).unwrap();
        assert_eq!(text, r#"{"ChooseObjective":1}"#);
    }
}
