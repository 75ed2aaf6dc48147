//! SNMP value types.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// A varbind value: SMIv2 application types plus the v2c/v3 exceptions.
///
/// Values decoded from an unrecognized tag become [`Value::Opaque`] so that
/// vendor extensions do not fail the whole response.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// INTEGER (signed 32-bit).
    Integer(i32),
    /// OCTET STRING (arbitrary bytes).
    OctetString(Bytes),
    /// NULL. Also the placeholder value in request varbinds.
    Null,
    /// OBJECT IDENTIFIER.
    ObjectIdentifier(Oid),
    /// IpAddress (4 octets, big-endian).
    IpAddress([u8; 4]),
    /// Counter32 (wrapping).
    Counter32(u32),
    /// Gauge32 / Unsigned32 (non-wrapping).
    Gauge32(u32),
    /// TimeTicks (hundredths of a second).
    TimeTicks(u32),
    /// Opaque. Carries content with an unrecognized or legacy tag.
    Opaque(Bytes),
    /// Counter64 (SNMPv2c/v3 only).
    Counter64(u64),
    /// noSuchObject exception: the OID is not implemented by the agent.
    NoSuchObject,
    /// noSuchInstance exception: the object exists but not this instance.
    NoSuchInstance,
    /// endOfMibView exception: no lexicographic successor remains.
    EndOfMibView,
}

impl Value {
    /// Value of an `Integer`.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Value of any unsigned 32-bit type, or a non-negative `Integer`.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v),
            Value::Integer(v) if *v >= 0 => Some(*v as u32),
            _ => None,
        }
    }

    /// Value widened to u64; covers `Counter64` and every unsigned
    /// 32-bit type, plus non-negative `Integer`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(u64::from(*v)),
            Value::Integer(v) if *v >= 0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Content of an `OctetString` or `Opaque`.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(v) | Value::Opaque(v) => Some(v),
            _ => None,
        }
    }

    /// `OctetString`/`Opaque` content when it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Value of an `ObjectIdentifier`.
    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    /// Value of an `IpAddress`.
    pub fn as_ip(&self) -> Option<std::net::Ipv4Addr> {
        match self {
            Value::IpAddress(octets) => Some(std::net::Ipv4Addr::from(*octets)),
            _ => None,
        }
    }

    /// True for the v2c/v3 exception values.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// Encode into a reverse buffer.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Opaque(data) => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_tag(tag::application::OPAQUE);
            }
            Value::Counter64(v) => buf.push_counter64(*v),
            Value::NoSuchObject => {
                buf.push_length(0);
                buf.push_tag(tag::context::NO_SUCH_OBJECT);
            }
            Value::NoSuchInstance => {
                buf.push_length(0);
                buf.push_tag(tag::context::NO_SUCH_INSTANCE);
            }
            Value::EndOfMibView => {
                buf.push_length(0);
                buf.push_tag(tag::context::END_OF_MIB_VIEW);
            }
        }
    }

    /// Decode one TLV.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let at = decoder.pos();
        let tag = decoder.read_tag()?;
        let len = decoder.read_length()?;

        match tag {
            tag::universal::INTEGER => Ok(Value::Integer(decoder.read_integer_content(len)?)),
            tag::universal::OCTET_STRING => Ok(Value::OctetString(decoder.read_bytes(len)?)),
            tag::universal::NULL => {
                if len != 0 {
                    return Err(Error::decode(at, DecodeErrorKind::InvalidNull));
                }
                Ok(Value::Null)
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Ok(Value::ObjectIdentifier(decoder.read_oid_content(len)?))
            }
            tag::application::IP_ADDRESS => {
                if len != 4 {
                    return Err(Error::decode(
                        at,
                        DecodeErrorKind::InvalidIpAddressLength { length: len },
                    ));
                }
                let data = decoder.read_bytes(4)?;
                Ok(Value::IpAddress([data[0], data[1], data[2], data[3]]))
            }
            tag::application::COUNTER32 => {
                Ok(Value::Counter32(decoder.read_unsigned32_content(len)?))
            }
            tag::application::GAUGE32 => Ok(Value::Gauge32(decoder.read_unsigned32_content(len)?)),
            tag::application::TIMETICKS => {
                Ok(Value::TimeTicks(decoder.read_unsigned32_content(len)?))
            }
            tag::application::OPAQUE => Ok(Value::Opaque(decoder.read_bytes(len)?)),
            tag::application::COUNTER64 => {
                Ok(Value::Counter64(decoder.read_counter64_content(len)?))
            }
            tag::context::NO_SUCH_OBJECT => {
                decoder.read_bytes(len)?;
                Ok(Value::NoSuchObject)
            }
            tag::context::NO_SUCH_INSTANCE => {
                decoder.read_bytes(len)?;
                Ok(Value::NoSuchInstance)
            }
            tag::context::END_OF_MIB_VIEW => {
                decoder.read_bytes(len)?;
                Ok(Value::EndOfMibView)
            }
            other => {
                // Tolerate vendor extensions: carry the content as Opaque.
                tracing::debug!(
                    tag = other,
                    offset = at,
                    "unrecognized value tag, decoding as Opaque"
                );
                Ok(Value::Opaque(decoder.read_bytes(len)?))
            }
        }
    }
}

fn write_hex(f: &mut std::fmt::Formatter<'_>, data: &[u8]) -> std::fmt::Result {
    for byte in data {
        write!(f, "{byte:02x}")?;
    }
    Ok(())
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "{s}"),
                Err(_) => {
                    write!(f, "0x")?;
                    write_hex(f, data)
                }
            },
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{oid}"),
            Value::IpAddress(a) => write!(f, "{}.{}.{}.{}", a[0], a[1], a[2], a[3]),
            Value::Counter32(v) | Value::Gauge32(v) => write!(f, "{v}"),
            Value::TimeTicks(v) => {
                let secs = v / 100;
                write!(
                    f,
                    "{}d {}h {}m {}s",
                    secs / 86400,
                    secs % 86400 / 3600,
                    secs % 3600 / 60,
                    secs % 60
                )
            }
            Value::Opaque(data) => {
                write!(f, "Opaque(0x")?;
                write_hex(f, data)?;
                write!(f, ")")
            }
            Value::Counter64(v) => write!(f, "{v}"),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Counter64(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::OctetString(Bytes::copy_from_slice(data))
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::OctetString(data)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

impl From<[u8; 4]> for Value {
    fn from(addr: [u8; 4]) -> Self {
        Value::IpAddress(addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn round_trip(value: Value) -> Value {
        let mut buf = EncodeBuf::new();
        value.encode(&mut buf);
        let mut decoder = Decoder::new(buf.finish());
        Value::decode(&mut decoder).unwrap()
    }

    #[test]
    fn all_types_round_trip() {
        for value in [
            Value::Integer(0),
            Value::Integer(-42),
            Value::Integer(i32::MIN),
            Value::Integer(i32::MAX),
            Value::OctetString(Bytes::from_static(b"hello world")),
            Value::OctetString(Bytes::new()),
            Value::OctetString(Bytes::from_static(&[0x00, 0xFF, 0x80])),
            Value::Null,
            Value::ObjectIdentifier(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)),
            Value::IpAddress([192, 168, 1, 1]),
            Value::Counter32(u32::MAX),
            Value::Gauge32(1_000_000_000),
            Value::TimeTicks(123_456),
            Value::Opaque(Bytes::from_static(&[0xDE, 0xAD, 0xBE, 0xEF])),
            Value::Counter64(u64::MAX),
            Value::NoSuchObject,
            Value::NoSuchInstance,
            Value::EndOfMibView,
        ] {
            assert_eq!(round_trip(value.clone()), value);
        }
    }

    #[test]
    fn unknown_tag_decodes_as_opaque() {
        // 0x45 is application class but not an SMIv2 type.
        let mut decoder = Decoder::from_slice(&[0x45, 0x03, 0x01, 0x02, 0x03]);
        let value = Value::decode(&mut decoder).unwrap();
        assert_eq!(value, Value::Opaque(Bytes::from_static(&[1, 2, 3])));
    }

    #[test]
    fn malformed_values_rejected() {
        // NULL with content
        let mut decoder = Decoder::from_slice(&[0x05, 0x01, 0x00]);
        assert!(Value::decode(&mut decoder).is_err());

        // IpAddress with 3 octets
        let mut decoder = Decoder::from_slice(&[0x40, 0x03, 0x01, 0x02, 0x03]);
        assert!(Value::decode(&mut decoder).is_err());

        // Truncated OCTET STRING
        let mut decoder = Decoder::from_slice(&[0x04, 0x05, b'h', b'i']);
        assert!(Value::decode(&mut decoder).is_err());
    }

    #[test]
    fn exception_content_skipped() {
        // Exceptions should be zero-length; tolerate agents that pad them.
        let mut decoder = Decoder::from_slice(&[0x82, 0x01, 0xFF]);
        assert_eq!(Value::decode(&mut decoder).unwrap(), Value::EndOfMibView);
        assert!(decoder.is_empty());
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::Integer(42).as_i32(), Some(42));
        assert_eq!(Value::Counter32(100).as_i32(), None);
        assert_eq!(Value::Gauge32(200).as_u32(), Some(200));
        assert_eq!(Value::Integer(-1).as_u32(), None);
        assert_eq!(Value::Counter64(10_000_000_000).as_u64(), Some(10_000_000_000));
        assert_eq!(Value::TimeTicks(300).as_u64(), Some(300));
        assert_eq!(
            Value::OctetString(Bytes::from_static(b"test")).as_str(),
            Some("test")
        );
        assert_eq!(
            Value::OctetString(Bytes::from_static(&[0xFF, 0xFE])).as_str(),
            None
        );
        assert_eq!(
            Value::IpAddress([10, 0, 0, 1]).as_ip(),
            Some(std::net::Ipv4Addr::new(10, 0, 0, 1))
        );
        assert!(Value::EndOfMibView.is_exception());
        assert!(!Value::Null.is_exception());
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Integer(-7).to_string(), "-7");
        assert_eq!(
            Value::OctetString(Bytes::from_static(b"eth0")).to_string(),
            "eth0"
        );
        assert_eq!(
            Value::OctetString(Bytes::from_static(&[0xFF, 0xFE])).to_string(),
            "0xfffe"
        );
        assert_eq!(Value::TimeTicks(123_456).to_string(), "0d 0h 20m 34s");
        assert_eq!(Value::IpAddress([10, 1, 2, 3]).to_string(), "10.1.2.3");
        assert_eq!(Value::EndOfMibView.to_string(), "endOfMibView");
    }

    #[test]
    fn from_conversions() {
        assert_eq!(Value::from(42i32), Value::Integer(42));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::from(5u64), Value::Counter64(5));
        assert_eq!(
            Value::from(std::net::Ipv4Addr::new(10, 0, 0, 1)),
            Value::IpAddress([10, 0, 0, 1])
        );
        assert_eq!(
            Value::from(oid!(1, 3, 6)),
            Value::ObjectIdentifier(oid!(1, 3, 6))
        );
    }
}
