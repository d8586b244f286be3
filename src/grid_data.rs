use crate::index_box::{Index, IndexBox};




/**
 * A dense multi-field array over a ghost-extended index box. The mapping is
 * backed by a flat array of data, field-major: each field occupies one
 * contiguous row-major plane over the box. This is the storage unit for
 * patch solution data, auxiliary data, and metric terms.
 *
 * No bounds checking is performed beyond debug assertions; callers (the
 * patch build protocol and the ghost exchange engine) are responsible for
 * correct extents. Allocation failure is fatal at this layer.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct GridData {
    extent: IndexBox,
    num_fields: usize,
    data: Vec<f64>,
}




// ============================================================================
impl GridData {


    /**
     * Allocate storage for the given box and field count, zero-initialized.
     * Any previously held contents are discarded: re-defining a container is
     * how re-leveling after regrid is handled, there is no incremental
     * resize.
     */
    pub fn define(extent: IndexBox, num_fields: usize) -> Self {
        let len = extent.len() * num_fields;
        Self {
            extent,
            num_fields,
            data: vec![0.0; len],
        }
    }


    /**
     * Generate a container with values defined from a closure of (field,
     * index).
     */
    pub fn from_function<F>(extent: IndexBox, num_fields: usize, f: F) -> Self
    where
        F: Fn(usize, Index) -> f64,
    {
        let mut result = Self::define(extent, num_fields);
        for m in 0..num_fields {
            for index in result.extent.iter() {
                let n = result.offset(m, index);
                result.data[n] = f(m, index);
            }
        }
        result
    }


    pub fn extent(&self) -> &IndexBox {
        &self.extent
    }


    pub fn num_fields(&self) -> usize {
        self.num_fields
    }


    pub fn len(&self) -> usize {
        self.data.len()
    }


    /**
     * Return the linear offset of (field, index) in the backing array.
     */
    pub fn offset(&self, field: usize, index: Index) -> usize {
        debug_assert!(field < self.num_fields);
        debug_assert!(self.extent.contains(index));
        field * self.extent.len() + self.extent.row_major_offset(index)
    }


    pub fn get(&self, field: usize, index: Index) -> f64 {
        self.data[self.offset(field, index)]
    }


    pub fn set(&mut self, field: usize, index: Index, value: f64) {
        let n = self.offset(field, index);
        self.data[n] = value;
    }


    pub fn add(&mut self, field: usize, index: Index, value: f64) {
        let n = self.offset(field, index);
        self.data[n] += value;
    }


    /**
     * Raw access to the backing array, for kernel calls.
     */
    pub fn data(&self) -> &[f64] {
        &self.data
    }


    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }


    /**
     * One field's contiguous plane.
     */
    pub fn field(&self, field: usize) -> &[f64] {
        let n = self.extent.len();
        &self.data[field * n..(field + 1) * n]
    }


    pub fn field_mut(&mut self, field: usize) -> &mut [f64] {
        let n = self.extent.len();
        &mut self.data[field * n..(field + 1) * n]
    }


    /**
     * Byte-exact bulk transfer into a caller-provided buffer. Used by the
     * partition pack, which serializes whole patches.
     */
    pub fn copy_to_slice(&self, buffer: &mut [f64]) {
        assert!(buffer.len() == self.data.len(), "partition buffer size mismatch");
        buffer.copy_from_slice(&self.data);
    }


    /**
     * Byte-exact bulk transfer from a caller-provided buffer.
     */
    pub fn copy_from_slice(&mut self, buffer: &[f64]) {
        assert!(buffer.len() == self.data.len(), "partition buffer size mismatch");
        self.data.copy_from_slice(buffer);
    }
}
