use crate::index_box::Index;
use serde::{Deserialize, Serialize};




#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]

/**
 * A transform descriptor for a patch boundary, produced by the mesh-topology
 * engine and passed by value into every cross-patch exchange. It encodes the
 * reorientation needed when a boundary crosses into another block of a
 * multi-block domain (or a periodic / pillow image), and degenerates to a
 * pure offset for neighbors within a single block.
 *
 * `map` carries an index in the target patch's frame to the source
 * neighbor's frame, at the granularity of the data being indexed: same
 * level for copies, the fine level for averaging (the coarse cell is first
 * expanded to its `refratio^rank` fine sub-cells), and the coarse patch's
 * refined index space for interpolation (divide the mapped index by
 * `refratio` to recover the coarse cell).
 */
pub struct Transform {
    /// Block id of the source neighbor.
    pub block: usize,

    /// Source axis drawn for each target axis.
    pub perm: [usize; 3],

    /// Per-target-axis reflection, applied before the offset.
    pub flip: [bool; 3],

    /// Per-target-axis offset, applied after permutation and reflection.
    pub offset: [i64; 3],
}




// ============================================================================
impl Transform {


    /**
     * The identity transform: neighbors within one block, no reorientation,
     * no offset.
     */
    pub fn identity(block: usize) -> Self {
        Self {
            block,
            perm: [0, 1, 2],
            flip: [false, false, false],
            offset: [0, 0, 0],
        }
    }


    /**
     * A pure translation, the common case for face neighbors within a
     * block: the neighbor's interior is reached by shifting the ghost index
     * by the patch extent along the face normal.
     */
    pub fn shift(block: usize, offset: [i64; 3]) -> Self {
        Self {
            offset,
            ..Self::identity(block)
        }
    }


    /**
     * Carry a target-frame cell index into the source neighbor's frame.
     * Reflection maps cell `v` to `-v - 1` so that the cell at the boundary
     * stays at the boundary (cell indices label half-open intervals).
     */
    pub fn map(&self, index: Index) -> Index {
        let t = [index.0, index.1, index.2];
        let mut s = [0_i64; 3];

        for a in 0..3 {
            let v = t[self.perm[a]];
            s[a] = if self.flip[a] { -v - 1 } else { v } + self.offset[a];
        }
        (s[0], s[1], s[2])
    }
}
