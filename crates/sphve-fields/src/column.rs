//! Typed column storage.
//!
//! A [`Column`] owns the data of one particle field. The scalar type is
//! fixed by the field table; typed accessors return a
//! [`FieldError::KindMismatch`] instead of reinterpreting memory.

use sphve_core::{FieldError, FieldId, FieldKind};

/// Capacity headroom applied when a column has to grow.
pub const GROWTH_RATE: f64 = 1.05;

/// Owned column payload.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    /// `f64` values.
    Real(Vec<f64>),
    /// `f32` values.
    Real32(Vec<f32>),
    /// `u64` keys.
    Key(Vec<u64>),
    /// `u32` counts.
    Count(Vec<u32>),
}

impl ColumnData {
    /// Empty payload of the given kind.
    pub fn empty(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Real => Self::Real(Vec::new()),
            FieldKind::Real32 => Self::Real32(Vec::new()),
            FieldKind::Key => Self::Key(Vec::new()),
            FieldKind::Count => Self::Count(Vec::new()),
        }
    }

    /// Scalar kind of the payload.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Real(_) => FieldKind::Real,
            Self::Real32(_) => FieldKind::Real32,
            Self::Key(_) => FieldKind::Key,
            Self::Count(_) => FieldKind::Count,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::Real(v) => v.len(),
            Self::Real32(v) => v.len(),
            Self::Key(v) => v.len(),
            Self::Count(v) => v.len(),
        }
    }

    /// Whether the payload holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the payload as a view.
    pub fn view(&self) -> ColumnView<'_> {
        match self {
            Self::Real(v) => ColumnView::Real(v),
            Self::Real32(v) => ColumnView::Real32(v),
            Self::Key(v) => ColumnView::Key(v),
            Self::Count(v) => ColumnView::Count(v),
        }
    }
}

/// Borrowed view of a column, used to hand data to file writers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColumnView<'a> {
    /// `f64` values.
    Real(&'a [f64]),
    /// `f32` values.
    Real32(&'a [f32]),
    /// `u64` keys.
    Key(&'a [u64]),
    /// `u32` counts.
    Count(&'a [u32]),
}

impl<'a> ColumnView<'a> {
    /// Number of elements in the view.
    pub fn len(&self) -> usize {
        match self {
            Self::Real(v) => v.len(),
            Self::Real32(v) => v.len(),
            Self::Key(v) => v.len(),
            Self::Count(v) => v.len(),
        }
    }

    /// Whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sub-view over `[first, last)`, clamped to the view length.
    pub fn slice(&self, first: usize, last: usize) -> ColumnView<'a> {
        let last = last.min(self.len());
        let first = first.min(last);
        match *self {
            Self::Real(v) => Self::Real(&v[first..last]),
            Self::Real32(v) => Self::Real32(&v[first..last]),
            Self::Key(v) => Self::Key(&v[first..last]),
            Self::Count(v) => Self::Count(&v[first..last]),
        }
    }

    /// Copy the view into an owned payload.
    pub fn to_owned_data(&self) -> ColumnData {
        match *self {
            Self::Real(v) => ColumnData::Real(v.to_vec()),
            Self::Real32(v) => ColumnData::Real32(v.to_vec()),
            Self::Key(v) => ColumnData::Key(v.to_vec()),
            Self::Count(v) => ColumnData::Count(v.to_vec()),
        }
    }
}

/// Grow or shrink `v` to `size`, reserving headroom when it has to grow.
pub fn reallocate<T: Clone + Default>(v: &mut Vec<T>, size: usize) {
    if size > v.capacity() {
        let target = (size as f64 * GROWTH_RATE) as usize;
        v.reserve(target.saturating_sub(v.len()));
    }
    v.resize(size, T::default());
}

/// Kind error for `field`.
fn kind_mismatch(field: FieldId, expected: FieldKind) -> FieldError {
    FieldError::KindMismatch {
        field,
        expected,
        found: field.kind(),
    }
}

/// Storage of one particle field.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    field: FieldId,
    data: ColumnData,
}

impl Column {
    /// Empty, deallocated column for `field`.
    pub fn new(field: FieldId) -> Self {
        Self {
            field,
            data: ColumnData::empty(field.kind()),
        }
    }

    /// The field this column stores.
    pub fn field(&self) -> FieldId {
        self.field
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the column holds no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resize to `size` elements, new elements are zero.
    pub fn resize(&mut self, size: usize) {
        match &mut self.data {
            ColumnData::Real(v) => reallocate(v, size),
            ColumnData::Real32(v) => reallocate(v, size),
            ColumnData::Key(v) => reallocate(v, size),
            ColumnData::Count(v) => reallocate(v, size),
        }
    }

    /// Drop the storage, returning memory to the allocator.
    pub fn free(&mut self) {
        self.data = ColumnData::empty(self.field.kind());
    }

    /// Bytes currently reserved by the column.
    pub fn capacity_bytes(&self) -> usize {
        match &self.data {
            ColumnData::Real(v) => v.capacity() * 8,
            ColumnData::Real32(v) => v.capacity() * 4,
            ColumnData::Key(v) => v.capacity() * 8,
            ColumnData::Count(v) => v.capacity() * 4,
        }
    }

    /// Borrow the payload.
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Borrow the payload as a view.
    pub fn view(&self) -> ColumnView<'_> {
        self.data.view()
    }

    /// Replace the payload. The kind and length must match.
    pub fn replace(&mut self, data: ColumnData) -> Result<(), FieldError> {
        if data.kind() != self.field.kind() {
            return Err(kind_mismatch(self.field, data.kind()));
        }
        if data.len() != self.len() {
            return Err(FieldError::LengthMismatch {
                field: self.field,
                expected: self.len(),
                found: data.len(),
            });
        }
        self.data = data;
        Ok(())
    }

    /// Copy `[first, last)` from `src` into the same range of `self`.
    pub fn copy_range_from(&mut self, src: &Column, first: usize, last: usize) -> Result<(), FieldError> {
        if last > self.len() || last > src.len() {
            return Err(FieldError::LengthMismatch {
                field: self.field,
                expected: last,
                found: self.len().min(src.len()),
            });
        }
        match (&mut self.data, &src.data) {
            (ColumnData::Real(d), ColumnData::Real(s)) => d[first..last].copy_from_slice(&s[first..last]),
            (ColumnData::Real32(d), ColumnData::Real32(s)) => {
                d[first..last].copy_from_slice(&s[first..last])
            }
            (ColumnData::Key(d), ColumnData::Key(s)) => d[first..last].copy_from_slice(&s[first..last]),
            (ColumnData::Count(d), ColumnData::Count(s)) => {
                d[first..last].copy_from_slice(&s[first..last])
            }
            _ => return Err(kind_mismatch(self.field, src.data.kind())),
        }
        Ok(())
    }

    /// Reorder the first `order.len()` elements so that `new[i] = old[order[i]]`.
    pub fn permute(&mut self, order: &[usize]) {
        fn apply<T: Copy>(v: &mut [T], order: &[usize]) {
            let old: Vec<T> = order.iter().map(|&i| v[i]).collect();
            v[..old.len()].copy_from_slice(&old);
        }
        match &mut self.data {
            ColumnData::Real(v) => apply(v, order),
            ColumnData::Real32(v) => apply(v, order),
            ColumnData::Key(v) => apply(v, order),
            ColumnData::Count(v) => apply(v, order),
        }
    }


    /// `f64` contents.
    pub fn real(&self) -> Result<&[f64], FieldError> {
        match &self.data {
            ColumnData::Real(v) => Ok(v),
            _ => Err(kind_mismatch(self.field, FieldKind::Real)),
        }
    }

    /// Mutable `f64` contents.
    pub fn real_mut(&mut self) -> Result<&mut [f64], FieldError> {
        match &mut self.data {
            ColumnData::Real(v) => Ok(v),
            _ => Err(kind_mismatch(self.field, FieldKind::Real)),
        }
    }

    /// `f32` contents.
    pub fn real32(&self) -> Result<&[f32], FieldError> {
        match &self.data {
            ColumnData::Real32(v) => Ok(v),
            _ => Err(kind_mismatch(self.field, FieldKind::Real32)),
        }
    }

    /// Mutable `f32` contents.
    pub fn real32_mut(&mut self) -> Result<&mut [f32], FieldError> {
        match &mut self.data {
            ColumnData::Real32(v) => Ok(v),
            _ => Err(kind_mismatch(self.field, FieldKind::Real32)),
        }
    }

    /// `u64` contents.
    pub fn keys(&self) -> Result<&[u64], FieldError> {
        match &self.data {
            ColumnData::Key(v) => Ok(v),
            _ => Err(kind_mismatch(self.field, FieldKind::Key)),
        }
    }

    /// Mutable `u64` contents.
    pub fn keys_mut(&mut self) -> Result<&mut [u64], FieldError> {
        match &mut self.data {
            ColumnData::Key(v) => Ok(v),
            _ => Err(kind_mismatch(self.field, FieldKind::Key)),
        }
    }

    /// `u32` contents.
    pub fn counts(&self) -> Result<&[u32], FieldError> {
        match &self.data {
            ColumnData::Count(v) => Ok(v),
            _ => Err(kind_mismatch(self.field, FieldKind::Count)),
        }
    }

    /// Mutable `u32` contents.
    pub fn counts_mut(&mut self) -> Result<&mut [u32], FieldError> {
        match &mut self.data {
            ColumnData::Count(v) => Ok(v),
            _ => Err(kind_mismatch(self.field, FieldKind::Count)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_zero_fills_and_free_releases() {
        let mut col = Column::new(FieldId::VX);
        col.resize(10);
        assert_eq!(col.len(), 10);
        assert!(col.real().unwrap().iter().all(|&v| v == 0.0));
        assert!(col.capacity_bytes() >= 80);
        col.free();
        assert!(col.is_empty());
        assert_eq!(col.capacity_bytes(), 0);
    }

    #[test]
    fn growth_reserves_headroom() {
        let mut v: Vec<f64> = Vec::new();
        reallocate(&mut v, 100);
        assert_eq!(v.len(), 100);
        assert!(v.capacity() >= 105);
    }

    #[test]
    fn wrong_kind_is_reported() {
        let mut col = Column::new(FieldId::M);
        col.resize(3);
        assert!(col.real32().is_ok());
        assert_eq!(
            col.real().unwrap_err(),
            FieldError::KindMismatch {
                field: FieldId::M,
                expected: FieldKind::Real,
                found: FieldKind::Real32,
            }
        );
    }

    #[test]
    fn mutable_accessors_report_wrong_kind() {
        let mut col = Column::new(FieldId::X);
        col.resize(2);
        let expect = |expected| FieldError::KindMismatch {
            field: FieldId::X,
            expected,
            found: FieldKind::Real,
        };
        assert_eq!(col.real32_mut().unwrap_err(), expect(FieldKind::Real32));
        assert_eq!(col.keys_mut().unwrap_err(), expect(FieldKind::Key));
        assert_eq!(col.counts_mut().unwrap_err(), expect(FieldKind::Count));
        col.real_mut().unwrap()[1] = 4.0;
        assert_eq!(col.real().unwrap(), &[0.0, 4.0]);

        let mut nc = Column::new(FieldId::NC);
        nc.resize(1);
        assert_eq!(
            nc.real_mut().unwrap_err(),
            FieldError::KindMismatch {
                field: FieldId::NC,
                expected: FieldKind::Real,
                found: FieldKind::Count,
            }
        );
    }

    #[test]
    fn replace_checks_length() {
        let mut col = Column::new(FieldId::NC);
        col.resize(2);
        assert!(col.replace(ColumnData::Count(vec![1, 2, 3])).is_err());
        col.replace(ColumnData::Count(vec![4, 5])).unwrap();
        assert_eq!(col.counts().unwrap(), &[4, 5]);
    }

    #[test]
    fn permute_reorders_prefix() {
        let mut col = Column::new(FieldId::X);
        col.resize(4);
        col.real_mut().unwrap().copy_from_slice(&[10.0, 11.0, 12.0, 13.0]);
        col.permute(&[2, 0, 1]);
        assert_eq!(col.real().unwrap(), &[12.0, 10.0, 11.0, 13.0]);
    }

    #[test]
    fn view_slices_are_clamped() {
        let data = ColumnData::Real(vec![1.0, 2.0, 3.0]);
        let v = data.view().slice(1, 10);
        assert_eq!(v, ColumnView::Real(&[2.0, 3.0]));
    }
}
