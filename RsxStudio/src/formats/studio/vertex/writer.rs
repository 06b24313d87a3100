//! Flat per-mesh output buffer
//!
//! A decoded mesh is written into one scratch slot as four consecutive
//! streams (indices, vertices, texcoords, weights). A 32-byte prefix records
//! `(offset, count)` for each stream. Every append is checked against the
//! slot size.

use bytemuck::{AnyBitPattern, NoUninit};
use byteorder::{ByteOrder, LittleEndian};

use super::{MeshVertex, VertexWeight};
use crate::error::{Error, Result};

/// Size of the stream table at the start of the buffer.
pub const HEADER_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Indices = 0,
    Vertices = 1,
    Texcoords = 2,
    Weights = 3,
}

impl Stream {
    #[must_use]
    pub const fn element_size(self) -> usize {
        match self {
            Stream::Indices => 2,
            Stream::Vertices => size_of::<MeshVertex>(),
            Stream::Texcoords => size_of::<[f32; 2]>(),
            Stream::Weights => size_of::<VertexWeight>(),
        }
    }
}

/// Appends typed records into a borrowed scratch slot.
#[derive(Debug)]
pub struct MeshWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
    current: Stream,
    streams: [(u32, u32); 4],
}

impl<'a> MeshWriter<'a> {
    /// # Errors
    /// Fails if the slot cannot hold the stream table.
    pub fn new(buf: &'a mut [u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::BufferCapacityExceeded {
                requested: HEADER_SIZE,
                capacity: buf.len(),
            });
        }
        Ok(Self {
            buf,
            pos: HEADER_SIZE,
            current: Stream::Indices,
            streams: [(HEADER_SIZE as u32, 0); 4],
        })
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes written so far, including the stream table.
    #[must_use]
    pub fn written(&self) -> usize {
        self.pos
    }

    /// Start a stream at the current write position.
    pub fn begin(&mut self, stream: Stream) {
        self.current = stream;
        self.streams[stream as usize] = (self.pos as u32, 0);
    }

    /// Append one record to the current stream.
    ///
    /// # Errors
    /// Returns [`Error::BufferCapacityExceeded`] when the record does not fit.
    pub fn push<T: NoUninit>(&mut self, value: T) -> Result<()> {
        let bytes = bytemuck::bytes_of(&value);
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            return Err(Error::BufferCapacityExceeded {
                requested: end,
                capacity: self.buf.len(),
            });
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        self.streams[self.current as usize].1 += 1;
        Ok(())
    }

    /// Write the stream table and hand back a read-only view.
    #[must_use]
    pub fn finish(self) -> MeshBuffer<'a> {
        let Self { buf, pos, streams, .. } = self;
        for (i, (offset, count)) in streams.iter().enumerate() {
            LittleEndian::write_u32(&mut buf[i * 8..i * 8 + 4], *offset);
            LittleEndian::write_u32(&mut buf[i * 8 + 4..i * 8 + 8], *count);
        }
        let buf: &'a [u8] = buf;
        MeshBuffer { buf: &buf[..pos] }
    }
}

/// A finished mesh buffer.
#[derive(Debug, Clone, Copy)]
pub struct MeshBuffer<'a> {
    buf: &'a [u8],
}

impl MeshBuffer<'_> {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.buf
    }

    /// `(offset, count)` of a stream as recorded in the table.
    pub fn stream(&self, stream: Stream) -> Result<(usize, usize)> {
        let at = stream as usize * 8;
        let table = self.buf.get(at..at + 8).ok_or(Error::OutOfBounds {
            offset: at,
            len: 8,
            size: self.buf.len(),
        })?;
        Ok((
            LittleEndian::read_u32(&table[0..4]) as usize,
            LittleEndian::read_u32(&table[4..8]) as usize,
        ))
    }

    fn collect<T: AnyBitPattern + NoUninit>(&self, stream: Stream) -> Result<Vec<T>> {
        let (offset, count) = self.stream(stream)?;
        let len = count * stream.element_size();
        let bytes = offset
            .checked_add(len)
            .and_then(|end| self.buf.get(offset..end))
            .ok_or(Error::OutOfBounds {
                offset,
                len,
                size: self.buf.len(),
            })?;
        Ok(bytemuck::pod_collect_to_vec(bytes))
    }

    pub fn indices(&self) -> Result<Vec<u16>> {
        self.collect(Stream::Indices)
    }

    pub fn vertices(&self) -> Result<Vec<MeshVertex>> {
        self.collect(Stream::Vertices)
    }

    pub fn texcoords(&self) -> Result<Vec<[f32; 2]>> {
        self.collect(Stream::Texcoords)
    }

    pub fn weights(&self) -> Result<Vec<VertexWeight>> {
        self.collect(Stream::Weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_streams_recorded_in_order() {
        let mut slot = vec![0u8; 256];
        let mut writer = MeshWriter::new(&mut slot).unwrap();
        writer.begin(Stream::Indices);
        for i in [0u16, 1, 2] {
            writer.push(i).unwrap();
        }
        writer.begin(Stream::Vertices);
        writer.push(MeshVertex::default()).unwrap();
        writer.begin(Stream::Texcoords);
        writer.begin(Stream::Weights);
        writer.push(VertexWeight { bone: 0, weight: 1.0 }).unwrap();

        let buffer = writer.finish();
        assert_eq!(buffer.stream(Stream::Indices).unwrap(), (32, 3));
        assert_eq!(buffer.stream(Stream::Vertices).unwrap(), (38, 1));
        assert_eq!(buffer.indices().unwrap(), vec![0, 1, 2]);
        assert_eq!(buffer.vertices().unwrap().len(), 1);
        assert!(buffer.texcoords().unwrap().is_empty());
        assert_eq!(buffer.weights().unwrap(), vec![VertexWeight { bone: 0, weight: 1.0 }]);
    }

    #[test]
    fn test_capacity_is_checked() {
        let mut slot = vec![0u8; HEADER_SIZE + 3];
        let mut writer = MeshWriter::new(&mut slot).unwrap();
        writer.begin(Stream::Indices);
        writer.push(1u16).unwrap();
        assert!(matches!(
            writer.push(2u16),
            Err(Error::BufferCapacityExceeded { requested: 36, capacity: 35 })
        ));
    }

    #[test]
    fn test_slot_too_small_for_header() {
        let mut slot = vec![0u8; 8];
        assert!(MeshWriter::new(&mut slot).is_err());
    }
}
