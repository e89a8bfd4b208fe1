//! Little-endian cursor over a byte buffer, plus the matching writer.

use nalgebra::{Point3, Vector3};

use crate::{BoundingBox, LoadError, PlaneEq, WorldTriangle};

/// Offset value meaning "no reference".
pub(crate) const NULL_OFFSET: i32 = -1;

pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Fails with [`LoadError::Truncated`] unless `len` more bytes are available.
    pub(crate) fn ensure(&self, len: usize) -> Result<(), LoadError> {
        if len > self.remaining() {
            return Err(LoadError::Truncated {
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Like [`ensure`](Self::ensure) for `count` records of `size` bytes each.
    pub(crate) fn ensure_records(&self, count: u32, size: usize) -> Result<(), LoadError> {
        let len = (count as usize).checked_mul(size).ok_or(LoadError::Truncated {
            offset: self.pos,
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        self.ensure(len)
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], LoadError> {
        self.ensure(len)?;
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], LoadError> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, LoadError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, LoadError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, LoadError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32, LoadError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32, LoadError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn read_point(&mut self) -> Result<Point3<f32>, LoadError> {
        Ok(Point3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub(crate) fn read_plane(&mut self) -> Result<PlaneEq, LoadError> {
        let normal = Vector3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?);
        let d = self.read_f32()?;
        Ok(PlaneEq::new(normal, d))
    }

    pub(crate) fn read_triangle(&mut self) -> Result<WorldTriangle, LoadError> {
        let v0 = self.read_point()?;
        let v1 = self.read_point()?;
        let v2 = self.read_point()?;
        let flags = self.read_u32()?;
        Ok(WorldTriangle::new(v0, v1, v2, flags))
    }

    pub(crate) fn read_bounding_box(&mut self) -> Result<BoundingBox, LoadError> {
        let min = self.read_point()?;
        let max = self.read_point()?;
        Ok(BoundingBox::new(min, max))
    }
}

/// Resolves an offset into an array of `len` elements that should hold
/// `count` consecutive records. Returns the first index, or 0 for an empty range.
pub(crate) fn resolve_range(what: &str, offset: i32, count: u32, len: usize) -> Result<u32, LoadError> {
    if offset == NULL_OFFSET {
        if count != 0 {
            return Err(LoadError::Corrupt(format!(
                "{what} offset is null but covers {count} entries"
            )));
        }
        return Ok(0);
    }
    let first = u32::try_from(offset)
        .map_err(|_| LoadError::Corrupt(format!("negative {what} offset {offset}")))?;
    if first as usize + count as usize > len {
        return Err(LoadError::Corrupt(format!(
            "{what} range {first}+{count} exceeds {len} entries"
        )));
    }
    Ok(first)
}

#[derive(Debug, Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[cfg(test)]
    pub(crate) fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    #[cfg(test)]
    pub(crate) fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub(crate) fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub(crate) fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub(crate) fn write_f32(&mut self, value: f32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub(crate) fn write_point(&mut self, point: &Point3<f32>) {
        self.write_f32(point.x);
        self.write_f32(point.y);
        self.write_f32(point.z);
    }

    pub(crate) fn write_plane(&mut self, plane: &PlaneEq) {
        let normal = plane.normal();
        self.write_f32(normal.x);
        self.write_f32(normal.y);
        self.write_f32(normal.z);
        self.write_f32(plane.d());
    }

    pub(crate) fn write_triangle(&mut self, triangle: &WorldTriangle) {
        for vertex in triangle.vertices() {
            self.write_point(vertex);
        }
        self.write_u32(triangle.flags());
    }

    pub(crate) fn write_bounding_box(&mut self, bounding_box: &BoundingBox) {
        self.write_point(bounding_box.min());
        self.write_point(bounding_box.max());
    }

    /// Writes the offset of a range, or [`NULL_OFFSET`] if it is empty.
    pub(crate) fn write_range(&mut self, first: u32, count: u32) {
        if count == 0 {
            self.write_i32(NULL_OFFSET);
        } else {
            self.write_i32(first as i32);
        }
    }
}
