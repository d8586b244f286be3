use core::ops::Range;




/**
 * A cell index. The third component is always 0 for two-dimensional boxes.
 */
pub type Index = (i64, i64, i64);




/**
 * Identifier for a Cartesian axis
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    I,
    J,
    K,
}




#[derive(Clone, Debug, PartialEq, Eq)]

/**
 * Represents a rectangular region in a discrete 2d or 3d index space. The
 * index type is signed 64-bit integer; patch interiors conventionally start
 * at index 1 so that ghost cells occupy `1 - mbc .. 1` and
 * `n + 1 .. n + mbc + 1` on each axis. The third axis is absent for
 * two-dimensional boxes, in which case the k component of every index is 0.
 */
pub struct IndexBox {
    di: Range<i64>,
    dj: Range<i64>,
    dk: Option<Range<i64>>,
}




// ============================================================================
impl IndexBox {


    pub fn new2(di: Range<i64>, dj: Range<i64>) -> Self {
        assert!(
            di.start <= di.end && dj.start <= dj.end,
            "index box has negative volume");

        Self { di, dj, dk: None }
    }


    pub fn new3(di: Range<i64>, dj: Range<i64>, dk: Range<i64>) -> Self {
        assert!(
            di.start <= di.end && dj.start <= dj.end && dk.start <= dk.end,
            "index box has negative volume");

        Self { di, dj, dk: Some(dk) }
    }


    /**
     * Return the number of axes: 2 or 3.
     */
    pub fn rank(&self) -> usize {
        if self.dk.is_some() { 3 } else { 2 }
    }


    /**
     * Return the number of indexes on each axis. The third extent is 1 for a
     * 2d box so that products over the tuple give the element count.
     */
    pub fn dim(&self) -> (usize, usize, usize) {
        let ni = (self.di.end - self.di.start) as usize;
        let nj = (self.dj.end - self.dj.start) as usize;
        let nk = self.dk.as_ref().map_or(1, |dk| (dk.end - dk.start) as usize);
        (ni, nj, nk)
    }


    /**
     * Return the number of elements in this box.
     */
    pub fn len(&self) -> usize {
        let (ni, nj, nk) = self.dim();
        ni * nj * nk
    }


    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }


    /**
     * Return the minimum index (inclusive).
     */
    pub fn start(&self) -> Index {
        (self.di.start, self.dj.start, self.dk.as_ref().map_or(0, |dk| dk.start))
    }


    /**
     * Return the maximum index (exclusive). The k component is 1 for a 2d
     * box.
     */
    pub fn end(&self) -> Index {
        (self.di.end, self.dj.end, self.dk.as_ref().map_or(1, |dk| dk.end))
    }


    pub fn range_i(&self) -> &Range<i64> {
        &self.di
    }


    pub fn range_j(&self) -> &Range<i64> {
        &self.dj
    }


    pub fn range_k(&self) -> Option<&Range<i64>> {
        self.dk.as_ref()
    }


    /**
     * Determine whether this box contains the given index.
     */
    pub fn contains(&self, index: Index) -> bool {
        let in_k = match &self.dk {
            Some(dk) => dk.contains(&index.2),
            None => index.2 == 0,
        };
        self.di.contains(&index.0) && self.dj.contains(&index.1) && in_k
    }


    /**
     * Determine whether another box (of the same rank) is a subset of this
     * one.
     */
    pub fn contains_box(&self, other: &Self) -> bool {
        assert!(self.rank() == other.rank());

        let (s0, s1) = (self.start(), self.end());
        let (o0, o1) = (other.start(), other.end());

        o0.0 >= s0.0 && o1.0 <= s1.0 &&
        o0.1 >= s0.1 && o1.1 <= s1.1 &&
        o0.2 >= s0.2 && o1.2 <= s1.2
    }


    /**
     * Expand this box by the given number of elements on every side of every
     * axis.
     */
    pub fn extend_all(&self, delta: i64) -> Self {
        Self {
            di: self.di.start - delta .. self.di.end + delta,
            dj: self.dj.start - delta .. self.dj.end + delta,
            dk: self.dk.as_ref().map(|dk| dk.start - delta .. dk.end + delta),
        }
    }


    /**
     * Shrink this box by the given number of elements on every side of every
     * axis.
     */
    pub fn trim_all(&self, delta: i64) -> Self {
        self.extend_all(-delta)
    }


    /**
     * Restrict one axis of this box to the given range.
     */
    pub fn with_range(&self, range: Range<i64>, axis: Axis) -> Self {
        let mut result = self.clone();
        match axis {
            Axis::I => result.di = range,
            Axis::J => result.dj = range,
            Axis::K => {
                assert!(result.dk.is_some(), "2d box has no k axis");
                result.dk = Some(range)
            }
        }
        result
    }


    /**
     * Increase the size of this box by the given factor. Maps a box between
     * granularity levels of the high-resolution index space.
     */
    pub fn scale(&self, factor: i64) -> Self {
        Self {
            di: self.di.start * factor .. self.di.end * factor,
            dj: self.dj.start * factor .. self.dj.end * factor,
            dk: self.dk.as_ref().map(|dk| dk.start * factor .. dk.end * factor),
        }
    }


    /**
     * Return the linear offset for the given index, in a row-major memory
     * buffer aligned with the start of this box (k increases fastest; for a
     * 2d box this degenerates to the usual i-major / j-minor layout).
     */
    pub fn row_major_offset(&self, index: Index) -> usize {
        let (_ni, nj, nk) = self.dim();
        let (i0, j0, k0) = self.start();
        let i = (index.0 - i0) as usize;
        let j = (index.1 - j0) as usize;
        let k = (index.2 - k0) as usize;
        (i * nj + j) * nk + k
    }


    /**
     * Return an iterator which traverses the box in row-major order.
     */
    pub fn iter(&self) -> impl Iterator<Item = Index> + '_ {
        let dj = self.dj.clone();
        let dk = self.dk.clone().unwrap_or(0..1);
        self.di.clone().flat_map(move |i| {
            let dk = dk.clone();
            dj.clone().flat_map(move |j| dk.clone().map(move |k| (i, j, k)))
        })
    }
}




/**
 * Less imposing factory functions to construct an IndexBox object.
 */
pub fn range2d(di: Range<i64>, dj: Range<i64>) -> IndexBox {
    IndexBox::new2(di, dj)
}

pub fn range3d(di: Range<i64>, dj: Range<i64>, dk: Range<i64>) -> IndexBox {
    IndexBox::new3(di, dj, dk)
}
