//! Object Identifier (OID) type.
//!
//! Arcs are stored inline in a `SmallVec<[u32; 16]>`, which covers common
//! MIB-2 OIDs without heap allocation. Comparison is lexicographic over
//! the arc sequence, which is the ordering GETNEXT/walks rely on.

use crate::error::{DecodeErrorKind, Error, OidErrorKind, Result};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of arcs in an OID.
///
/// RFC 2578 Section 3.5: "there are at most 128 sub-identifiers in a value".
/// Enforced during BER decoding to bound work on hostile input.
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// The empty OID.
    pub fn empty() -> Self {
        Self {
            arcs: SmallVec::new(),
        }
    }

    /// Create an OID from any iterator of arcs.
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    /// Create an OID from a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse dotted notation, e.g. `"1.3.6.1.2.1.1.1.0"`.
    ///
    /// Parsing checks syntax only; X.690 arc constraints are checked by
    /// [`validate`](Self::validate) or at encode time.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::invalid_oid(OidErrorKind::Empty));
        }

        let mut arcs = SmallVec::new();
        for part in s.split('.') {
            let arc: u32 = part
                .parse()
                .map_err(|_| Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s))?;
            arcs.push(arc);
        }
        Ok(Self { arcs })
    }

    /// The arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// True for the empty OID.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// True if `self` is `other` or lies in the subtree rooted at `other`.
    pub fn starts_with(&self, other: &Oid) -> bool {
        self.arcs.len() >= other.arcs.len() && self.arcs[..other.arcs.len()] == other.arcs[..]
    }

    /// All arcs except the last; `None` for the empty OID.
    pub fn parent(&self) -> Option<Oid> {
        let (_, rest) = self.arcs.split_last()?;
        Some(Oid {
            arcs: SmallVec::from_slice(rest),
        })
    }

    /// Append one arc.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Validate arc constraints per X.690 Section 8.19.4:
    /// the first arc is 0, 1, or 2; the second is at most 39 unless the
    /// first is 2.
    pub fn validate(&self) -> Result<()> {
        let Some(&first) = self.arcs.first() else {
            return Ok(());
        };
        if first > 2 {
            return Err(Error::invalid_oid(OidErrorKind::InvalidFirstArc(first)));
        }
        if let Some(&second) = self.arcs.get(1)
            && first < 2
            && second >= 40
        {
            return Err(Error::invalid_oid(OidErrorKind::InvalidSecondArc {
                first,
                second,
            }));
        }
        Ok(())
    }

    /// Check the arc count against [`MAX_OID_LEN`].
    pub fn validate_length(&self) -> Result<()> {
        if self.arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid(OidErrorKind::TooManyArcs {
                count: self.arcs.len(),
                max: MAX_OID_LEN,
            }));
        }
        Ok(())
    }

    /// Encode the OID content octets (X.690 Section 8.19).
    ///
    /// The first two arcs fold into one subidentifier `40*a + b`; every
    /// subidentifier is base-128 with continuation bits. A one-arc OID
    /// encodes as if its second arc were zero, so it does not round
    /// trip; X.690 has no lossless form for it.
    pub fn to_ber(&self) -> SmallVec<[u8; 64]> {
        let mut bytes = SmallVec::new();

        match self.arcs.as_slice() {
            [] => {}
            [first] => encode_subidentifier(&mut bytes, u64::from(*first) * 40),
            [first, second, rest @ ..] => {
                encode_subidentifier(&mut bytes, u64::from(*first) * 40 + u64::from(*second));
                for &arc in rest {
                    encode_subidentifier(&mut bytes, u64::from(arc));
                }
            }
        }
        bytes
    }

    /// Decode OID content octets.
    ///
    /// Enforces [`MAX_OID_LEN`]. Non-minimal subidentifier encodings
    /// (leading 0x80 octets) are accepted.
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Ok(Self::empty());
        }

        let mut arcs = SmallVec::new();

        let (first_subid, mut pos) = decode_subidentifier(data, 0)?;
        match first_subid {
            0..40 => {
                arcs.push(0);
                arcs.push(first_subid as u32);
            }
            40..80 => {
                arcs.push(1);
                arcs.push(first_subid as u32 - 40);
            }
            _ => {
                // The fold can carry a second arc up to u32::MAX under
                // the root arc 2.
                let second = u32::try_from(first_subid - 80)
                    .map_err(|_| Error::decode(pos, DecodeErrorKind::IntegerOverflow))?;
                arcs.push(2);
                arcs.push(second);
            }
        }

        while pos < data.len() {
            let (subid, next) = decode_subidentifier(data, pos)?;
            let arc = u32::try_from(subid)
                .map_err(|_| Error::decode(next, DecodeErrorKind::IntegerOverflow))?;
            arcs.push(arc);
            pos = next;

            if arcs.len() > MAX_OID_LEN {
                return Err(Error::decode(pos, DecodeErrorKind::OidTooLong {
                    arcs: arcs.len(),
                }));
            }
        }

        Ok(Self { arcs })
    }
}

/// Append one base-128 subidentifier.
fn encode_subidentifier(bytes: &mut SmallVec<[u8; 64]>, value: u64) {
    // ceil(bit_length / 7) continuation groups, minimum one.
    let groups = if value == 0 {
        1
    } else {
        (70 - value.leading_zeros() as usize) / 7
    };
    for i in (0..groups).rev() {
        let mut byte = (value >> (7 * i)) as u8 & 0x7F;
        if i > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
}

/// Decode one base-128 subidentifier starting at `pos`,
/// returning `(value, next_pos)`.
fn decode_subidentifier(data: &[u8], mut pos: usize) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    loop {
        let byte = *data
            .get(pos)
            .ok_or_else(|| Error::decode(pos, DecodeErrorKind::TruncatedData))?;
        pos += 1;

        if value > u64::MAX >> 7 {
            return Err(Error::decode(pos, DecodeErrorKind::IntegerOverflow));
        }
        value = (value << 7) | u64::from(byte & 0x7F);

        if byte & 0x80 == 0 {
            return Ok((value, pos));
        }
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut arcs = self.arcs.iter();
        if let Some(first) = arcs.next() {
            write!(f, "{first}")?;
            for arc in arcs {
                write!(f, ".{arc}")?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::new(arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.cmp(&other.arcs)
    }
}

/// Build an [`Oid`] from literal arcs.
///
/// ```
/// use rsnmp::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}
