use crate::config::{Config, Dim};
use crate::index_box::{Axis, IndexBox};
use crate::kernels::KernelTable;
use crate::patch::{sibling_origin, Patch};
use crate::transform::Transform;


/*
 * The ghost exchange engine. Each operation fills one boundary region of
 * one target patch from one source neighbor: same-level copies, fine-to-
 * coarse averaging, and coarse-to-fine interpolation, for faces and for
 * corners, plus the whole-interior sibling transfers used by regrid. The
 * mesh-topology layer drives these per neighbor pair and supplies the
 * transform; each call touches exactly one region, so operations on
 * disjoint targets can run concurrently.
 *
 * `time_interp` selects the synchronized data source on both sides: at an
 * intermediate time level of a sub-cycled run, coarse patches expose their
 * time-interpolated buffer instead of the current solution.
 */




/**
 * Whether ghost filling runs at all for this exchange pass. At intermediate
 * time levels the coarse data is only consistent if it was time
 * interpolated; when that is disabled, intermediate passes are skipped and
 * the solver advances ghost data itself.
 */
pub fn fill_ghost(config: &Config, time_interp: bool) -> bool {
    !time_interp || config.timeinterp2fillghost
}




// ============================================================================
// boundary regions


fn face_axis(iface: usize) -> Axis {
    match iface / 2 {
        0 => Axis::I,
        1 => Axis::J,
        _ => Axis::K,
    }
}


/**
 * The ghost strip of width mbc on face `iface` of a patch, spanning the
 * interior range on the tangential axes. Faces are numbered axis-major:
 * 0/1 are the x-lower/x-upper faces, 2/3 the y faces, 4/5 the z faces.
 */
pub fn face_ghost_region(config: &Config, iface: usize) -> IndexBox {
    assert!(iface < config.dim.num_faces());
    let interior = config.interior_box();
    let (n, axis) = match face_axis(iface) {
        Axis::I => (config.mx, Axis::I),
        Axis::J => (config.my, Axis::J),
        Axis::K => (config.mz, Axis::K),
    };
    let range = if iface % 2 == 0 {
        1 - config.mbc..1
    } else {
        n + 1..n + config.mbc + 1
    };
    interior.with_range(range, axis)
}


/**
 * The half (2d) or quarter (3d) of a coarse face strip covered by fine
 * neighbor `igrid`, counted in z-order over the tangential axes.
 */
pub fn face_ghost_half_region(config: &Config, iface: usize, igrid: usize) -> IndexBox {
    let mut region = face_ghost_region(config, iface);
    let normal = face_axis(iface);

    let mut bit = 0;
    for (axis, n) in [(Axis::I, config.mx), (Axis::J, config.my), (Axis::K, config.mz)] {
        if axis == normal || (axis == Axis::K && config.dim == Dim::Two) {
            continue;
        }
        let range = if (igrid >> bit) & 1 == 0 {
            1..n / 2 + 1
        } else {
            n / 2 + 1..n + 1
        };
        region = region.with_range(range, axis);
        bit += 1;
    }
    assert!(igrid >> bit == 0, "igrid out of range for this face");
    region
}


/**
 * The mbc-cube of ghost cells at corner `icorner`, counted in z-order: bit
 * 0 selects the upper end of the i axis, bit 1 of j, bit 2 of k.
 */
pub fn corner_region(config: &Config, icorner: usize) -> IndexBox {
    assert!(icorner < config.dim.num_corners());
    let mut region = config.interior_box();
    let axes = [(Axis::I, config.mx), (Axis::J, config.my), (Axis::K, config.mz)];
    for (bit, &(axis, n)) in axes.iter().enumerate() {
        if axis == Axis::K && config.dim == Dim::Two {
            break;
        }
        let range = if (icorner >> bit) & 1 == 0 {
            1 - config.mbc..1
        } else {
            n + 1..n + config.mbc + 1
        };
        region = region.with_range(range, axis);
    }
    region
}




// ============================================================================
// face and corner exchanges


/**
 * Fill the face-`iface` ghost strip of `this` from a same-level neighbor.
 * A no-op at an intermediate time level when the time-interpolated fill is
 * disabled, like every copy and interpolation below; averaging is never
 * gated.
 */
pub fn copy_face(
    config: &Config,
    table: &KernelTable,
    this: &mut Patch,
    neighbor: &Patch,
    iface: usize,
    tr: &Transform,
    time_interp: bool,
) {
    if !fill_ghost(config, time_interp) {
        return;
    }
    let region = face_ghost_region(config, iface);
    let src = neighbor.q_time_sync(time_interp);
    (table.copy_face)(this.q_time_sync_mut(time_interp), src, &region, tr);
}


/**
 * Fill the portion of a coarse face strip covered by fine neighbor `igrid`
 * by averaging its interior cells. Under manifold mode the mean is weighted
 * by the fine patch's cell areas / volumes.
 */
pub fn average_face(
    config: &Config,
    table: &KernelTable,
    coarse: &mut Patch,
    fine: &Patch,
    iface: usize,
    igrid: usize,
    tr: &Transform,
    time_interp: bool,
) {
    let region = face_ghost_half_region(config, iface, igrid);
    let weights = fine.cell_weights();
    let src = fine.q_time_sync(time_interp);
    (table.average_face)(
        config, coarse.q_time_sync_mut(time_interp), src, weights, &region, tr);
}


/**
 * Fill the face-`iface` ghost strip of a fine patch by interpolating from
 * its coarse neighbor. Runs after the coarse patch's own ghost cells are
 * valid, so the slope stencil may reach one cell past the shared interface.
 */
pub fn interpolate_face(
    config: &Config,
    table: &KernelTable,
    fine: &mut Patch,
    coarse: &Patch,
    iface: usize,
    tr: &Transform,
    time_interp: bool,
) {
    if !fill_ghost(config, time_interp) {
        return;
    }
    let region = face_ghost_region(config, iface);
    let src = coarse.q_time_sync(time_interp);
    (table.interpolate_face)(config, fine.q_time_sync_mut(time_interp), src, &region, tr);
}


pub fn copy_corner(
    config: &Config,
    table: &KernelTable,
    this: &mut Patch,
    neighbor: &Patch,
    icorner: usize,
    tr: &Transform,
    time_interp: bool,
) {
    if !fill_ghost(config, time_interp) {
        return;
    }
    let region = corner_region(config, icorner);
    let src = neighbor.q_time_sync(time_interp);
    (table.copy_corner)(this.q_time_sync_mut(time_interp), src, &region, tr);
}


pub fn average_corner(
    config: &Config,
    table: &KernelTable,
    coarse: &mut Patch,
    fine: &Patch,
    icorner: usize,
    tr: &Transform,
    time_interp: bool,
) {
    let region = corner_region(config, icorner);
    let weights = fine.cell_weights();
    let src = fine.q_time_sync(time_interp);
    (table.average_corner)(
        config, coarse.q_time_sync_mut(time_interp), src, weights, &region, tr);
}


pub fn interpolate_corner(
    config: &Config,
    table: &KernelTable,
    fine: &mut Patch,
    coarse: &Patch,
    icorner: usize,
    tr: &Transform,
    time_interp: bool,
) {
    if !fill_ghost(config, time_interp) {
        return;
    }
    let region = corner_region(config, icorner);
    let src = coarse.q_time_sync(time_interp);
    (table.interpolate_corner)(config, fine.q_time_sync_mut(time_interp), src, &region, tr);
}




// ============================================================================
// sibling transfers (regrid)


/**
 * The quadrant / octant of the coarse interior covered by sibling `igrid`.
 */
fn sibling_quadrant(config: &Config, igrid: usize) -> IndexBox {
    let (oi, oj, ok) = sibling_origin(config, igrid);
    let interior = config.interior_box();
    let mut region = interior
        .with_range(oi..oi + config.mx / 2, Axis::I)
        .with_range(oj..oj + config.my / 2, Axis::J);
    if config.dim == Dim::Three {
        region = region.with_range(ok..ok + config.mz / 2, Axis::K);
    }
    region
}


/**
 * The shift carrying coarse-quadrant fine-granularity indices into sibling
 * `igrid`'s own frame (or its inverse, for interpolation).
 */
fn sibling_shift(config: &Config, block: usize, igrid: usize, invert: bool) -> Transform {
    let (oi, oj, ok) = sibling_origin(config, igrid);
    let sign = if invert { -1 } else { 1 };
    Transform::shift(block, [
        sign * 2 * (oi - 1),
        sign * 2 * (oj - 1),
        sign * 2 * (ok - 1).max(0),
    ])
}


/**
 * Populate a replacement coarse patch's interior from the four (eight in
 * 3d) fine siblings it replaces, averaging each sibling into its quadrant.
 */
pub fn average2coarse(
    config: &Config,
    table: &KernelTable,
    coarse: &mut Patch,
    fine_siblings: &[Patch],
) {
    assert!(fine_siblings.len() == config.dim.num_siblings());
    for (igrid, fine) in fine_siblings.iter().enumerate() {
        let region = sibling_quadrant(config, igrid);
        let tr = sibling_shift(config, coarse.blockno, igrid, true);
        (table.average2coarse)(
            config, &mut coarse.griddata, &fine.griddata, fine.cell_weights(), &region, &tr);
    }
}


/**
 * Populate newly created fine siblings' interiors by interpolating the
 * coarse patch they replace.
 */
pub fn interpolate2fine(
    config: &Config,
    table: &KernelTable,
    coarse: &Patch,
    fine_siblings: &mut [Patch],
) {
    assert!(fine_siblings.len() == config.dim.num_siblings());
    let region = config.interior_box();
    for (igrid, fine) in fine_siblings.iter_mut().enumerate() {
        let tr = sibling_shift(config, coarse.blockno, igrid, false);
        (table.interpolate2fine)(config, &mut fine.griddata, &coarse.griddata, &region, &tr);
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::config::Config;
    use crate::grid_data::GridData;
    use crate::index_box::range2d;
    use crate::patch::{BuildMode, LogicalPatch};

    fn leaf(patchno: usize) -> LogicalPatch {
        LogicalPatch {
            blockno: 0,
            patchno,
            level: 0,
            xlower: 0.0,
            ylower: 0.0,
            zlower: 0.0,
            xupper: 1.0,
            yupper: 1.0,
            zupper: 1.0,
        }
    }

    fn built(config: &Config, patchno: usize) -> Patch {
        Patch::build(config, &leaf(patchno), None, None, BuildMode::ForUpdate)
    }

    #[test]
    fn gating_skips_intermediate_passes_when_disabled() {
        let mut config = Config::basic2d(8, 8, 2, 1);
        assert!(fill_ghost(&config, false));
        assert!(fill_ghost(&config, true));

        config.timeinterp2fillghost = false;
        assert!(fill_ghost(&config, false));
        assert!(!fill_ghost(&config, true));
    }

    #[test]
    fn intermediate_copies_are_skipped_when_gating_is_off() {
        let mut config = Config::basic2d(8, 8, 2, 1);
        config.subcycle = true;
        config.timeinterp2fillghost = false;
        let table = KernelTable::new(&config).unwrap();

        let mut this = built(&config, 0);
        let mut neighbor = built(&config, 1);
        neighbor.griddata_time_interpolated = Some(GridData::from_function(
            config.grid_box(), 1, |_, (i, j, _)| (1 + i + 10 * j) as f64));
        let tr = Transform::shift(0, [8, 0, 0]);

        // An intermediate-level pass with the time-interpolated fill
        // disabled leaves the target untouched.
        copy_face(&config, &table, &mut this, &neighbor, 0, &tr, true);
        copy_corner(&config, &table, &mut this, &neighbor, 0, &tr, true);
        interpolate_face(&config, &table, &mut this, &neighbor, 0, &tr, true);
        interpolate_corner(&config, &table, &mut this, &neighbor, 0, &tr, true);
        for index in config.grid_box().iter() {
            assert_eq!(this.q_time_sync(true).get(0, index), 0.0);
            assert_eq!(this.griddata.get(0, index), 0.0);
        }

        // A synchronized pass is unaffected by the policy.
        neighbor.griddata = GridData::from_function(config.grid_box(), 1, |_, (i, j, _)| {
            (1 + i + 10 * j) as f64
        });
        copy_face(&config, &table, &mut this, &neighbor, 0, &tr, false);
        assert_eq!(this.griddata.get(0, (0, 3, 0)), neighbor.griddata.get(0, (8, 3, 0)));
    }

    #[test]
    fn boundary_regions_have_the_right_shape() {
        let config = Config::basic2d(8, 8, 2, 1);

        assert_eq!(face_ghost_region(&config, 0), range2d(-1..1, 1..9));
        assert_eq!(face_ghost_region(&config, 3), range2d(1..9, 9..11));
        assert_eq!(face_ghost_half_region(&config, 0, 1), range2d(-1..1, 5..9));
        assert_eq!(corner_region(&config, 0), range2d(-1..1, -1..1));
        assert_eq!(corner_region(&config, 3), range2d(9..11, 9..11));
    }

    #[test]
    fn copy_face_fills_from_the_neighbor_interior() {
        let config = Config::basic2d(8, 8, 2, 1);
        let table = KernelTable::new(&config).unwrap();

        let mut left = built(&config, 0);
        let mut right = built(&config, 1);
        left.griddata = GridData::from_function(config.grid_box(), 1, |_, (i, j, _)| {
            (10 * i + j) as f64
        });

        // Right patch's x-lower ghost strip reads the left interior shifted
        // by the patch width.
        copy_face(
            &config, &table, &mut right, &left, 0, &Transform::shift(0, [8, 0, 0]), false);
        assert_eq!(right.griddata.get(0, (0, 3, 0)), left.griddata.get(0, (8, 3, 0)));
        assert_eq!(right.griddata.get(0, (-1, 8, 0)), left.griddata.get(0, (7, 8, 0)));

        // Interior and corners are untouched.
        assert_eq!(right.griddata.get(0, (1, 3, 0)), 0.0);
        assert_eq!(right.griddata.get(0, (0, 0, 0)), 0.0);
    }

    #[test]
    fn average_face_restricts_the_fine_interior() {
        let config = Config::basic2d(8, 8, 2, 1);
        let table = KernelTable::new(&config).unwrap();

        let mut coarse = built(&config, 0);
        let mut fine = built(&config, 1);
        fine.griddata = GridData::from_function(config.grid_box(), 1, |_, (i, j, _)| {
            (i + 100 * j) as f64
        });

        // Fine neighbor sits to the x-lower side, covering the lower half of
        // the coarse face (igrid 0).
        average_face(
            &config, &table, &mut coarse, &fine, 0, 0, &Transform::shift(0, [8, 0, 0]), false);

        // Coarse ghost cell (0, 1) covers fine cells i in {7, 8}, j in
        // {1, 2}: mean of i + 100 j over the four.
        let expect = (7.0 + 8.0) / 2.0 + 100.0 * 1.5;
        assert!((coarse.griddata.get(0, (0, 1, 0)) - expect).abs() < 1e-12);

        // The upper half of the strip belongs to another fine neighbor.
        assert_eq!(coarse.griddata.get(0, (0, 8, 0)), 0.0);
    }

    #[test]
    fn interpolate_face_reproduces_linear_coarse_data() {
        let config = Config::basic2d(8, 8, 2, 1);
        let table = KernelTable::new(&config).unwrap();

        let mut fine = built(&config, 1);
        let mut coarse = built(&config, 0);
        coarse.griddata = GridData::from_function(config.grid_box(), 1, |_, (i, j, _)| {
            3.0 * (i as f64 - 0.5) + (j as f64 - 0.5)
        });

        // Fine patch to the x-upper side of the coarse patch, lower half:
        // fine ghost index f maps to coarse refined index f + 16 in i.
        interpolate_face(
            &config, &table, &mut fine, &coarse, 0, &Transform::shift(0, [16, 0, 0]), false);

        // Fine ghost cell (0, 3) sits at coarse refined index (16, 3):
        // coarse cell (8, 2), center offsets (+1/4, -1/4), so its center in
        // coarse units is (7.75, 1.25).
        let expect = 3.0 * 7.75 + 1.25;
        assert!((fine.griddata.get(0, (0, 3, 0)) - expect).abs() < 1e-12);
    }

    #[test]
    fn corner_copy_fills_only_the_corner_block() {
        let config = Config::basic2d(8, 8, 2, 1);
        let table = KernelTable::new(&config).unwrap();

        let mut this = built(&config, 0);
        let mut diag = built(&config, 1);
        diag.griddata = GridData::from_function(config.grid_box(), 1, |_, (i, j, _)| {
            (i * j) as f64
        });

        // Corner 0 neighbor is diagonally down-left: shift by the patch
        // extent on both axes.
        copy_corner(
            &config, &table, &mut this, &diag, 0, &Transform::shift(0, [8, 8, 0]), false);
        assert_eq!(this.griddata.get(0, (0, 0, 0)), diag.griddata.get(0, (8, 8, 0)));
        assert_eq!(this.griddata.get(0, (0, 1, 0)), 0.0);
    }

    #[test]
    fn sibling_transfers_round_trip_linear_data() {
        let config = Config::basic2d(8, 8, 2, 1);
        let table = KernelTable::new(&config).unwrap();

        let mut coarse = built(&config, 0);
        coarse.griddata = GridData::from_function(config.grid_box(), 1, |_, (i, j, _)| {
            1.5 * (i as f64 - 0.5) - 0.75 * (j as f64 - 0.5)
        });

        let mut siblings: Vec<Patch> = (1..5).map(|n| built(&config, n)).collect();
        interpolate2fine(&config, &table, &coarse, &mut siblings);

        // Sibling 3 interior cell (1, 1) covers the coarse quadrant origin
        // (5, 5): refined index (9, 9), coarse cell (5, 5), offsets -1/4.
        let expect = 1.5 * (5.0 - 0.5 - 0.25) - 0.75 * (5.0 - 0.5 - 0.25);
        assert!((siblings[3].griddata.get(0, (1, 1, 0)) - expect).abs() < 1e-12);

        // Averaging the interpolant back reproduces the coarse interior
        // exactly for linear data.
        let mut recovered = built(&config, 5);
        average2coarse(&config, &table, &mut recovered, &siblings);
        for index in config.interior_box().iter() {
            let diff = recovered.griddata.get(0, index) - coarse.griddata.get(0, index);
            assert!(diff.abs() < 1e-12);
        }
    }
}
