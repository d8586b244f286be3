use crate::config::{Config, Dim, KernelVersion};
use crate::error::Error;
use crate::grid_data::GridData;
use crate::index_box::{Axis, IndexBox};
use crate::transform::Transform;




/**
 * Direction of a shell transfer between a grid and a flat buffer.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackDir {
    Pack,
    Unpack,
}




/// Interpolate between two step levels; returns a nonzero code on a cell
/// count mismatch.
pub type TimeInterpKernel =
    fn(&Config, &GridData, &GridData, &mut GridData, f64, usize) -> i32;

/// Transfer the ghost shell of one grid to or from a flat buffer.
pub type LocalPackKernel = fn(&Config, &mut GridData, &mut [f64], PackDir) -> i32;

/// Same-level transfer over a target-frame region.
pub type CopyKernel = fn(&mut GridData, &GridData, &IndexBox, &Transform);

/// Fine-to-coarse restriction over a coarse-frame region, optionally
/// weighted by the fine patch's cell areas / volumes.
pub type AverageKernel =
    fn(&Config, &mut GridData, &GridData, Option<&GridData>, &IndexBox, &Transform);

/// Coarse-to-fine interpolation over a fine-frame region.
pub type InterpolateKernel = fn(&Config, &mut GridData, &GridData, &IndexBox, &Transform);

/// Refinement criterion over the patch interior.
pub type ThresholdKernel = fn(&Config, &GridData, f64) -> bool;




/**
 * The kernel indirection table. Drivers and solvers call through these
 * entries rather than naming kernel routines directly, so a solver can
 * override individual slots (a different refinement criterion, a custom
 * interpolant) without touching the exchange engine. `new` installs the
 * entries for the configured kernel version; the version 5 / 3d combination
 * has no kernel set and is rejected.
 */
#[derive(Clone, Copy)]
pub struct KernelTable {
    pub timeinterp: TimeInterpKernel,
    pub local_ghost_pack: LocalPackKernel,
    pub copy_face: CopyKernel,
    pub copy_corner: CopyKernel,
    pub average_face: AverageKernel,
    pub average_corner: AverageKernel,
    pub interpolate_face: InterpolateKernel,
    pub interpolate_corner: InterpolateKernel,
    pub average2coarse: AverageKernel,
    pub interpolate2fine: InterpolateKernel,
    pub exceeds_threshold: ThresholdKernel,
}




// ============================================================================
impl KernelTable {


    pub fn new(config: &Config) -> Result<Self, Error> {
        match (config.dim, config.kernel_version) {
            (Dim::Three, KernelVersion::V5) => Err(Error::UnsupportedKernelVersion(3, 5)),
            (_, KernelVersion::V4) => Ok(Self {
                timeinterp: claw46::timeinterp,
                local_ghost_pack: claw46::local_ghost_pack,
                copy_face: claw46::copy,
                copy_corner: claw46::copy,
                average_face: claw46::average,
                average_corner: claw46::average,
                interpolate_face: claw46::interpolate,
                interpolate_corner: claw46::interpolate,
                average2coarse: claw46::average,
                interpolate2fine: claw46::interpolate,
                exceeds_threshold: claw46::exceeds_threshold,
            }),
            (_, KernelVersion::V5) => Ok(Self {
                timeinterp: claw5::timeinterp,
                local_ghost_pack: claw5::local_ghost_pack,
                copy_face: claw5::copy,
                copy_corner: claw5::copy,
                average_face: claw5::average,
                average_corner: claw5::average,
                interpolate_face: claw5::interpolate,
                interpolate_corner: claw5::interpolate,
                average2coarse: claw5::average,
                interpolate2fine: claw5::interpolate,
                exceeds_threshold: claw5::exceeds_threshold,
            }),
        }
    }
}




/**
 * Version 4.x entry points. Both kernel generations store patch data
 * field-major here, so the entries delegate to shared cores; the split is
 * kept so either set can diverge independently.
 */
mod claw46 {
    use super::*;

    pub fn timeinterp(
        config: &Config,
        qcurr: &GridData,
        qlast: &GridData,
        qinterp: &mut GridData,
        alpha: f64,
        psize: usize,
    ) -> i32 {
        timeinterp_core(config, qcurr, qlast, qinterp, alpha, psize)
    }

    pub fn local_ghost_pack(
        config: &Config,
        q: &mut GridData,
        buffer: &mut [f64],
        dir: PackDir,
    ) -> i32 {
        ghost_shell_transfer(config, q, buffer, dir)
    }

    pub fn copy(dst: &mut GridData, src: &GridData, region: &IndexBox, tr: &Transform) {
        copy_region(dst, src, region, tr)
    }

    pub fn average(
        config: &Config,
        dst: &mut GridData,
        src: &GridData,
        weights: Option<&GridData>,
        region: &IndexBox,
        tr: &Transform,
    ) {
        average_region(config, dst, src, weights, region, tr)
    }

    pub fn interpolate(
        config: &Config,
        dst: &mut GridData,
        src: &GridData,
        region: &IndexBox,
        tr: &Transform,
    ) {
        interpolate_region(config, dst, src, region, tr)
    }

    pub fn exceeds_threshold(config: &Config, q: &GridData, threshold: f64) -> bool {
        value_exceeds_threshold(config, q, threshold)
    }
}




/**
 * Version 5.x entry points.
 */
mod claw5 {
    use super::*;

    pub fn timeinterp(
        config: &Config,
        qcurr: &GridData,
        qlast: &GridData,
        qinterp: &mut GridData,
        alpha: f64,
        psize: usize,
    ) -> i32 {
        timeinterp_core(config, qcurr, qlast, qinterp, alpha, psize)
    }

    pub fn local_ghost_pack(
        config: &Config,
        q: &mut GridData,
        buffer: &mut [f64],
        dir: PackDir,
    ) -> i32 {
        ghost_shell_transfer(config, q, buffer, dir)
    }

    pub fn copy(dst: &mut GridData, src: &GridData, region: &IndexBox, tr: &Transform) {
        copy_region(dst, src, region, tr)
    }

    pub fn average(
        config: &Config,
        dst: &mut GridData,
        src: &GridData,
        weights: Option<&GridData>,
        region: &IndexBox,
        tr: &Transform,
    ) {
        average_region(config, dst, src, weights, region, tr)
    }

    pub fn interpolate(
        config: &Config,
        dst: &mut GridData,
        src: &GridData,
        region: &IndexBox,
        tr: &Transform,
    ) {
        interpolate_region(config, dst, src, region, tr)
    }

    pub fn exceeds_threshold(config: &Config, q: &GridData, threshold: f64) -> bool {
        value_exceeds_threshold(config, q, threshold)
    }
}




// ============================================================================
// shared cores


/**
 * The shell of interior cells that time interpolation populates: the
 * interior minus a centered hole, `mint` cells wide on the i and j axes.
 * Only this shell feeds coarse-to-fine exchanges at intermediate times, so
 * the bulk of the patch is skipped.
 */
fn timeinterp_shell(config: &Config) -> (IndexBox, IndexBox) {
    let mint = config.interp_stencil_width / 2 + 1;
    let interior = config.interior_box();
    let hole = interior
        .with_range(1 + mint..config.mx + 1 - mint, Axis::I)
        .with_range(1 + mint..config.my + 1 - mint, Axis::J);
    (interior, hole)
}


fn timeinterp_core(
    config: &Config,
    qcurr: &GridData,
    qlast: &GridData,
    qinterp: &mut GridData,
    alpha: f64,
    psize: usize,
) -> i32 {
    let (interior, hole) = timeinterp_shell(config);

    let mut count = 0;
    for m in 0..config.meqn {
        for index in interior.iter() {
            if hole.contains(index) {
                continue;
            }
            let last = qlast.get(m, index);
            qinterp.set(m, index, last + alpha * (qcurr.get(m, index) - last));
            count += 1;
        }
    }
    if count != psize {
        return 1;
    }
    0
}


/**
 * The ghost-extended shell the remote ghost pack transfers: the whole
 * extended grid minus a centered interior hole, `mint = refratio * mbc`
 * cells in from the interior boundary on every axis. The shell carries the
 * boundary layers plus just enough interior for coarse-fine averaging on
 * the receiving side.
 */
fn ghost_pack_shell(config: &Config) -> (IndexBox, IndexBox) {
    let mint = config.refratio * config.mbc;
    assert!(
        config.mx >= 2 * mint && config.my >= 2 * mint,
        "ghost packing hole has negative extent"
    );
    let grid = config.grid_box();
    let mut hole = grid
        .with_range(1 + mint..config.mx + 1 - mint, Axis::I)
        .with_range(1 + mint..config.my + 1 - mint, Axis::J);
    if config.dim == Dim::Three {
        assert!(config.mz >= 2 * mint, "ghost packing hole has negative extent");
        hole = hole.with_range(1 + mint..config.mz + 1 - mint, Axis::K);
    }
    (grid, hole)
}


/**
 * Number of cells in the packed shell, independent of field count.
 */
pub fn ghost_shell_cells(config: &Config) -> usize {
    let (grid, hole) = ghost_pack_shell(config);
    grid.len() - hole.len()
}


fn ghost_shell_transfer(
    config: &Config,
    q: &mut GridData,
    buffer: &mut [f64],
    dir: PackDir,
) -> i32 {
    let mint = config.refratio * config.mbc;
    if config.mx < 2 * mint || config.my < 2 * mint {
        return 2;
    }
    let (grid, hole) = ghost_pack_shell(config);

    let mut n = 0;
    for m in 0..q.num_fields() {
        for index in grid.iter() {
            if hole.contains(index) {
                continue;
            }
            if n >= buffer.len() {
                return 1;
            }
            match dir {
                PackDir::Pack => buffer[n] = q.get(m, index),
                PackDir::Unpack => q.set(m, index, buffer[n]),
            }
            n += 1;
        }
    }
    if n != buffer.len() {
        return 1;
    }
    0
}


fn copy_region(dst: &mut GridData, src: &GridData, region: &IndexBox, tr: &Transform) {
    assert!(dst.num_fields() == src.num_fields());
    for m in 0..dst.num_fields() {
        for index in region.iter() {
            dst.set(m, index, src.get(m, tr.map(index)));
        }
    }
}


/**
 * Restrict fine data onto the coarse cells of `region`. Each coarse cell is
 * expanded to its `refratio^rank` covering fine cells, the transform carries
 * those fine-granularity indices into the fine source patch's frame, and
 * the restriction is the (area-weighted, under manifold mode) mean.
 */
fn average_region(
    config: &Config,
    dst: &mut GridData,
    src: &GridData,
    weights: Option<&GridData>,
    region: &IndexBox,
    tr: &Transform,
) {
    assert!(dst.num_fields() == src.num_fields());
    let r = config.refratio;
    let rk = if config.dim == Dim::Three { r } else { 1 };

    for m in 0..dst.num_fields() {
        for c in region.iter() {
            let mut sum = 0.0;
            let mut wsum = 0.0;
            for di in 0..r {
                for dj in 0..r {
                    for dk in 0..rk {
                        let f = tr.map((
                            (c.0 - 1) * r + 1 + di,
                            (c.1 - 1) * r + 1 + dj,
                            if config.dim == Dim::Three { (c.2 - 1) * r + 1 + dk } else { 0 },
                        ));
                        let w = weights.map_or(1.0, |a| a.get(0, f));
                        sum += w * src.get(m, f);
                        wsum += w;
                    }
                }
            }
            dst.set(m, c, sum / wsum);
        }
    }
}


/**
 * Monotonized central slope: zero at an extremum, otherwise the central
 * difference clipped to twice the smaller one-sided difference.
 */
fn limited_slope(qm: f64, q0: f64, qp: f64) -> f64 {
    let dl = q0 - qm;
    let dr = qp - q0;
    if dl * dr <= 0.0 {
        0.0
    } else {
        let dc = 0.5 * (qp - qm);
        dc.signum() * dc.abs().min(2.0 * dl.abs()).min(2.0 * dr.abs())
    }
}


/**
 * Interpolate coarse data onto the fine cells of `region`. The transform
 * carries each fine target index into the coarse source patch's refined
 * index space; dividing by `refratio` recovers the enclosing coarse cell
 * and the sub-cell position. Values are linear in each axis with limited
 * slopes, so interpolation never introduces a new extremum.
 */
fn interpolate_region(
    config: &Config,
    dst: &mut GridData,
    src: &GridData,
    region: &IndexBox,
    tr: &Transform,
) {
    assert!(dst.num_fields() == src.num_fields());
    let r = config.refratio;

    for m in 0..dst.num_fields() {
        for index in region.iter() {
            let f = tr.map(index);
            let (ci, di) = (((f.0 - 1).div_euclid(r)) + 1, (f.0 - 1).rem_euclid(r));
            let (cj, dj) = (((f.1 - 1).div_euclid(r)) + 1, (f.1 - 1).rem_euclid(r));
            let (ck, dk) = if config.dim == Dim::Three {
                (((f.2 - 1).div_euclid(r)) + 1, (f.2 - 1).rem_euclid(r))
            } else {
                (0, 0)
            };

            // Fine cell center relative to the coarse center, in units of
            // the coarse cell width.
            let xi = (2 * di + 1 - r) as f64 / (2 * r) as f64;
            let xj = (2 * dj + 1 - r) as f64 / (2 * r) as f64;

            let q0 = src.get(m, (ci, cj, ck));
            let si = limited_slope(
                src.get(m, (ci - 1, cj, ck)), q0, src.get(m, (ci + 1, cj, ck)));
            let sj = limited_slope(
                src.get(m, (ci, cj - 1, ck)), q0, src.get(m, (ci, cj + 1, ck)));

            let mut value = q0 + xi * si + xj * sj;
            if config.dim == Dim::Three {
                let xk = (2 * dk + 1 - r) as f64 / (2 * r) as f64;
                let sk = limited_slope(
                    src.get(m, (ci, cj, ck - 1)), q0, src.get(m, (ci, cj, ck + 1)));
                value += xk * sk;
            }
            dst.set(m, index, value);
        }
    }
}


/**
 * True when any interior cell of any field exceeds the threshold in
 * magnitude. This is the stock refinement criterion; solvers with
 * gradient-based or single-field criteria override the table slot.
 */
fn value_exceeds_threshold(config: &Config, q: &GridData, threshold: f64) -> bool {
    for m in 0..q.num_fields() {
        for index in config.interior_box().iter() {
            if q.get(m, index).abs() > threshold {
                return true;
            }
        }
    }
    false
}
