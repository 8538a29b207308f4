//! Byte-level encoder and decoder.
//!
//! Every scalar is fixed-width and big-endian. Composite values are built
//! from scalars plus count-prefixed sequences, see [`WireFormat`].

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// The ten numeric kinds the wire format knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ScalarKind {
    /// Encoded width in bytes.
    pub const fn size(self) -> usize {
        match self {
            ScalarKind::U8 | ScalarKind::I8 => 1,
            ScalarKind::U16 | ScalarKind::I16 => 2,
            ScalarKind::U32 | ScalarKind::I32 | ScalarKind::F32 => 4,
            ScalarKind::U64 | ScalarKind::I64 | ScalarKind::F64 => 8,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarKind::I8
                | ScalarKind::I16
                | ScalarKind::I32
                | ScalarKind::I64
                | ScalarKind::F32
                | ScalarKind::F64
        )
    }
}

/// A primitive with a fixed big-endian wire representation.
pub trait Scalar: Copy + Sized {
    const KIND: ScalarKind;

    fn put(self, buf: &mut BytesMut);

    /// Reads the value. Callers must ensure `KIND.size()` bytes remain.
    fn get(buf: &mut Bytes) -> Self;
}

macro_rules! impl_scalar {
    ($($ty:ty => $kind:ident, $put:ident, $get:ident;)*) => {
        $(
            impl Scalar for $ty {
                const KIND: ScalarKind = ScalarKind::$kind;

                fn put(self, buf: &mut BytesMut) {
                    buf.$put(self);
                }

                fn get(buf: &mut Bytes) -> Self {
                    buf.$get()
                }
            }
        )*
    };
}

impl_scalar! {
    u8 => U8, put_u8, get_u8;
    u16 => U16, put_u16, get_u16;
    u32 => U32, put_u32, get_u32;
    u64 => U64, put_u64, get_u64;
    i8 => I8, put_i8, get_i8;
    i16 => I16, put_i16, get_i16;
    i32 => I32, put_i32, get_i32;
    i64 => I64, put_i64, get_i64;
    f32 => F32, put_f32, get_f32;
    f64 => F64, put_f64, get_f64;
}

/// A composite value with a fixed wire grammar.
pub trait WireFormat: Sized {
    fn encode(&self, enc: &mut Encoder) -> Result<(), ProtocolError>;
    fn decode(dec: &mut Decoder) -> Result<Self, ProtocolError>;
}

/// Append-only frame writer.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Writes one scalar.
    pub fn put<T: Scalar>(&mut self, value: T) {
        value.put(&mut self.buf);
    }

    /// Writes raw bytes with no length prefix.
    pub fn put_slice(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Writes a 16-bit element count.
    pub fn put_count_u16(&mut self, len: usize) -> Result<(), ProtocolError> {
        let count = u16::try_from(len).map_err(|_| ProtocolError::SequenceTooLong {
            len,
            max: u16::MAX as usize,
        })?;
        self.put(count);
        Ok(())
    }

    /// Writes a 32-bit element count.
    pub fn put_count_u32(&mut self, len: usize) -> Result<(), ProtocolError> {
        let count = u32::try_from(len).map_err(|_| ProtocolError::SequenceTooLong {
            len,
            max: u32::MAX as usize,
        })?;
        self.put(count);
        Ok(())
    }

    /// Writes a composite value.
    pub fn put_value<T: WireFormat>(&mut self, value: &T) -> Result<(), ProtocolError> {
        value.encode(self)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes the encoder and returns the frame bytes.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over one received frame.
#[derive(Debug, Clone)]
pub struct Decoder {
    buf: Bytes,
    total: usize,
}

impl Decoder {
    pub fn new(frame: Bytes) -> Self {
        let total = frame.len();
        Self { buf: frame, total }
    }

    fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() < needed {
            return Err(ProtocolError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    /// Reads one scalar.
    pub fn get<T: Scalar>(&mut self) -> Result<T, ProtocolError> {
        self.ensure(T::KIND.size())?;
        Ok(T::get(&mut self.buf))
    }

    /// Reads `len` raw bytes.
    pub fn take(&mut self, len: usize) -> Result<Bytes, ProtocolError> {
        self.ensure(len)?;
        Ok(self.buf.split_to(len))
    }

    /// Reads `count` scalars, checking the whole span before allocating.
    pub fn get_many<T: Scalar>(&mut self, count: usize) -> Result<Vec<T>, ProtocolError> {
        let needed = count
            .checked_mul(T::KIND.size())
            .ok_or(ProtocolError::Truncated {
                needed: usize::MAX,
                remaining: self.buf.remaining(),
            })?;
        self.ensure(needed)?;
        Ok((0..count).map(|_| T::get(&mut self.buf)).collect())
    }

    pub fn get_count_u16(&mut self) -> Result<usize, ProtocolError> {
        Ok(self.get::<u16>()? as usize)
    }

    pub fn get_count_u32(&mut self) -> Result<usize, ProtocolError> {
        Ok(self.get::<u32>()? as usize)
    }

    /// Reads a composite value.
    pub fn get_value<T: WireFormat>(&mut self) -> Result<T, ProtocolError> {
        T::decode(self)
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.total - self.buf.remaining()
    }
}
