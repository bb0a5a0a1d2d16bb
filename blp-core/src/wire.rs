use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::WireError;
use crate::event::{CorrelationId, Event};
use crate::request::Request;
use crate::session::Identity;

pub const WIRE_VERSION: u8 = 1;

/// Максимальный размер кадра (без 4 байт длины)
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Кадры клиент -> хост
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientFrame {
    Start,
    OpenService {
        name: String,
    },
    SendRequest {
        request: Request,
        identity: Option<Identity>,
        correlation_id: Option<CorrelationId>,
    },
    Stop,
}

/// Кадры хост -> клиент
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerFrame {
    Event(Event),
}

/// Версия + postcard payload
pub fn encode_v1<T: Serialize>(frame: &T) -> Result<Vec<u8>, WireError> {
    let mut out = vec![WIRE_VERSION];
    out.extend_from_slice(&postcard::to_allocvec(frame)?);
    Ok(out)
}

pub fn decode<T: DeserializeOwned>(buf: &[u8]) -> Result<T, WireError> {
    let (&ver, payload) = buf.split_first().ok_or(WireError::PacketTooShort)?;
    if ver != WIRE_VERSION {
        return Err(WireError::UnsupportedWireVersion(ver));
    }
    Ok(postcard::from_bytes(payload)?)
}

/// Пишет кадр: длина (u32, big-endian), затем пакет
pub fn write_frame<T: Serialize, W: Write>(w: &mut W, frame: &T) -> Result<(), WireError> {
    let packet = encode_v1(frame)?;
    if packet.len() > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(packet.len()));
    }
    w.write_all(&(packet.len() as u32).to_be_bytes())?;
    w.write_all(&packet)?;
    w.flush()?;
    Ok(())
}

/// Читает один кадр; `Ok(None)`, если поток закрыт на границе кадра
pub fn read_frame<T: DeserializeOwned, R: Read>(r: &mut R) -> Result<Option<T>, WireError> {
    let mut len = [0u8; 4];
    match r.read_exact(&mut len) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len) as usize;
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(len));
    }
    let mut packet = vec![0u8; len];
    r.read_exact(&mut packet)?;
    decode(&packet).map(Some)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::element::ElementNode;
    use crate::event::{EventType, Message};

    #[test]
    fn frames_survive_a_stream() {
        let request = Request::builder("//blp/refdata", "ReferenceDataRequest")
            .subject("IBM US Equity")
            .field("PX_LAST")
            .with_override("REFERENCE_DATE", "20150625")
            .build();
        let sent = ClientFrame::SendRequest {
            request,
            identity: None,
            correlation_id: Some("20150625".into()),
        };

        let mut buf = Vec::new();
        write_frame(&mut buf, &ClientFrame::Start).unwrap();
        write_frame(&mut buf, &sent).unwrap();

        let mut r = Cursor::new(buf);
        assert_eq!(read_frame(&mut r).unwrap(), Some(ClientFrame::Start));
        assert_eq!(read_frame(&mut r).unwrap(), Some(sent));
        assert_eq!(read_frame::<ClientFrame, _>(&mut r).unwrap(), None);
    }

    #[test]
    fn event_frame_keeps_element_tree() {
        let msg = Message::new(
            "ReferenceDataResponse",
            ElementNode::sequence("ReferenceDataResponse", vec![ElementNode::value("x", 1.5)]),
        )
        .with_correlation(7_u64);
        let frame = ServerFrame::Event(Event::new(EventType::Response, vec![msg]));

        let bytes = encode_v1(&frame).unwrap();
        assert_eq!(bytes[0], WIRE_VERSION);
        assert_eq!(decode::<ServerFrame>(&bytes).unwrap(), frame);
    }

    #[test]
    fn decode_rejects_empty_and_unknown_version() {
        assert!(matches!(
            decode::<ServerFrame>(&[]),
            Err(WireError::PacketTooShort)
        ));
        assert!(matches!(
            decode::<ServerFrame>(&[9, 0]),
            Err(WireError::UnsupportedWireVersion(9))
        ));
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let mut buf = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes().to_vec();
        buf.push(WIRE_VERSION);
        let err = read_frame::<ServerFrame, _>(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, WireError::FrameTooLarge(_)));
    }

    #[test]
    fn truncated_frame_is_an_io_error() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &ClientFrame::Stop).unwrap();
        buf.truncate(buf.len() - 1);
        let err = read_frame::<ClientFrame, _>(&mut Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, WireError::Io(_)));
    }
}
