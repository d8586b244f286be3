use std::any::Any;
use std::sync::Arc;

use crate::config::{Config, Dim};
use crate::grid_data::GridData;
use crate::index_box::Index;
use crate::kernels::KernelTable;
use crate::metric::{CoordinateMap, Metric2d, Metric3d};
use crate::registers::Registers;




/**
 * How a patch is being built. Ghost patches are read-only snapshots of a
 * remote process's leaf: they are never time stepped, so the step-retry
 * buffers are skipped. `packed_area` records whether the remote payload
 * carried per-cell areas, or whether they must be recomputed from the map.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildMode {
    ForUpdate,
    ForGhost { packed_area: bool },
}




#[derive(Clone, Copy, Debug)]

/**
 * A leaf of the mesh hierarchy as reported by the topology engine: block
 * and leaf ids, refinement level, and logical bounds within the block's
 * unit cube.
 */
pub struct LogicalPatch {
    pub blockno: usize,
    pub patchno: usize,
    pub level: u32,
    pub xlower: f64,
    pub ylower: f64,
    pub zlower: f64,
    pub xupper: f64,
    pub yupper: f64,
    pub zupper: f64,
}




#[derive(Clone, Copy, Debug)]

/**
 * A multi-block "brick" arrangement: blocks tile the unit cube in a
 * rectangular grid, and per-block logical coordinates are normalized into
 * the global unit cube before the affine map into the physical box.
 */
pub struct Brick {
    pub shape: (i64, i64, i64),
}

impl Brick {
    pub fn normalize(&self, blockno: usize, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let (ni, nj, nk) = self.shape;
        let b = blockno as i64;
        let bi = b % ni;
        let bj = (b / ni) % nj;
        let bk = b / (ni * nj);
        assert!(bk < nk, "block id {} outside brick {:?}", blockno, self.shape);
        (
            (bi as f64 + x) / ni as f64,
            (bj as f64 + y) / nj as f64,
            (bk as f64 + z) / nk as f64,
        )
    }
}




#[derive(Clone, Debug)]
pub struct Geometry2d {
    pub xlower: f64,
    pub ylower: f64,
    pub xupper: f64,
    pub yupper: f64,
    pub dx: f64,
    pub dy: f64,
    /// Metric terms, present only under manifold mode.
    pub metric: Option<Metric2d>,
}




#[derive(Clone, Debug)]
pub struct Geometry3d {
    pub xlower: f64,
    pub ylower: f64,
    pub zlower: f64,
    pub xupper: f64,
    pub yupper: f64,
    pub zupper: f64,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub metric: Option<Metric3d>,
}




/**
 * The dimension-specific sub-record of a patch. Exactly one variant is
 * live; the discriminant is fixed at build time by the configuration and
 * never changes across rebuilds.
 */
#[derive(Clone, Debug)]
pub enum PatchGeometry {
    TwoDim(Geometry2d),
    ThreeDim(Geometry3d),
}




/**
 * Per-leaf numerical state: the solution and auxiliary grids, optional
 * step-retry / time-interpolation / error / elliptic buffers, geometry and
 * metric terms, and the coarse-fine conservation registers. One instance
 * exists per local leaf, and transiently per remote ghost leaf.
 *
 * The user and solver data slots are type-erased handles to caller-owned
 * state; the patch holds a shared reference and never assumes ownership of
 * the underlying object's lifecycle. They survive rebuilds.
 */
pub struct Patch {
    pub blockno: usize,
    pub patchno: usize,
    pub level: u32,
    pub mbc: i64,
    pub meqn: usize,
    pub maux: usize,
    pub mfields: usize,

    pub geometry: PatchGeometry,

    /// Current solution. Always allocated.
    pub griddata: GridData,
    /// Previous-step solution, for sub-cycled time interpolation.
    pub griddata_last: Option<GridData>,
    /// Saved solution for step retry.
    pub griddata_save: Option<GridData>,
    /// Interpolated solution at an intermediate time level.
    pub griddata_time_interpolated: Option<GridData>,

    pub aux: Option<GridData>,
    pub aux_save: Option<GridData>,

    pub griderror: Option<GridData>,
    pub exactsolution: Option<GridData>,

    pub rhs: Option<GridData>,
    pub elliptic_soln: Option<GridData>,
    pub elliptic_error: Option<GridData>,

    /// Conservation registers for the four faces (2d, time_sync only).
    pub registers: Option<Registers>,

    /// Number of patches meeting at each corner across block boundaries;
    /// written by the topology engine, zeroed at build.
    pub block_corner_count: Vec<u32>,

    pub user_data: Option<Arc<dyn Any + Send + Sync>>,
    pub solver_data: Option<Arc<dyn Any + Send + Sync>>,
}




// ============================================================================
impl Patch {


    /**
     * Establish geometry and storage for a leaf. Every build call starts
     * from scratch, even for a previously existing patch: adaptation may
     * have changed the refinement level, and the "populated only when"
     * rules below depend only on the configuration and build mode.
     *
     * Physical bounds: manifold mode uses the leaf's logical bounds
     * directly (the map gives them meaning); Cartesian mode normalizes per
     * block through the brick arrangement, then maps affinely into the
     * configured physical box.
     */
    pub fn build(
        config: &Config,
        leaf: &LogicalPatch,
        brick: Option<&Brick>,
        map: Option<&dyn CoordinateMap>,
        mode: BuildMode,
    ) -> Self {
        let geometry = Self::build_geometry(config, leaf, brick, map);
        let grid = config.grid_box();

        let griddata = GridData::define(grid.clone(), config.meqn);
        let griddata_time_interpolated = if config.subcycle {
            Some(GridData::define(grid.clone(), config.meqn))
        } else {
            None
        };

        let (griderror, exactsolution) = if config.compute_error {
            (
                Some(GridData::define(grid.clone(), config.meqn)),
                Some(GridData::define(grid.clone(), config.meqn)),
            )
        } else {
            (None, None)
        };

        let (aux, aux_save) = if config.maux > 0 {
            let aux = Some(GridData::define(grid.clone(), config.maux));
            let aux_save = if config.save_aux {
                Some(GridData::define(grid.clone(), config.maux))
            } else {
                None
            };
            (aux, aux_save)
        } else {
            (None, None)
        };

        let (rhs, elliptic_soln, elliptic_error) = if config.rhs_fields > 0 {
            let rhs = Some(GridData::define(grid.clone(), config.rhs_fields));
            if config.compute_error {
                (
                    rhs,
                    Some(GridData::define(grid.clone(), config.rhs_fields)),
                    Some(GridData::define(grid.clone(), config.rhs_fields)),
                )
            } else {
                (rhs, None, None)
            }
        } else {
            (None, None, None)
        };

        let registers = if config.time_sync {
            let mut registers = Registers::new(config);
            let (spacing, metric) = match &geometry {
                PatchGeometry::TwoDim(g) => ((g.dx, g.dy), g.metric.as_ref()),
                PatchGeometry::ThreeDim(_) => unreachable!("time_sync is rejected in 3d"),
            };
            registers.setup(config, spacing, metric);
            Some(registers)
        } else {
            None
        };

        let (griddata_last, griddata_save) = match mode {
            BuildMode::ForUpdate => (
                Some(GridData::define(grid.clone(), config.meqn)),
                Some(GridData::define(grid, config.meqn)),
            ),
            // Ghost patches are read-only snapshots and are never stepped.
            BuildMode::ForGhost { .. } => (None, None),
        };

        Self {
            blockno: leaf.blockno,
            patchno: leaf.patchno,
            level: leaf.level,
            mbc: config.mbc,
            meqn: config.meqn,
            maux: config.maux,
            mfields: config.rhs_fields,
            geometry,
            griddata,
            griddata_last,
            griddata_save,
            griddata_time_interpolated,
            aux,
            aux_save,
            griderror,
            exactsolution,
            rhs,
            elliptic_soln,
            elliptic_error,
            registers,
            block_corner_count: vec![0; config.dim.num_corners()],
            user_data: None,
            solver_data: None,
        }
    }


    /**
     * Build a coarse patch that replaces a set of finer siblings during
     * coarsening. Identical to `build` except that under manifold mode the
     * interior cell areas / volumes are replaced by the exact sum over the
     * covering fine cells, which the coarse geometry alone cannot supply.
     */
    pub fn build_from_fine(
        config: &Config,
        leaf: &LogicalPatch,
        brick: Option<&Brick>,
        map: Option<&dyn CoordinateMap>,
        mode: BuildMode,
        fine_siblings: &[Patch],
    ) -> Self {
        assert!(fine_siblings.len() == config.dim.num_siblings());
        let mut patch = Self::build(config, leaf, brick, map, mode);

        if config.manifold {
            // Siblings are a factor-of-two refinement of the coarse patch.
            let r = 2;
            assert!(config.mx % 2 == 0 && config.my % 2 == 0);

            for (igrid, fine) in fine_siblings.iter().enumerate() {
                let origin = sibling_origin(config, igrid);
                match (&mut patch.geometry, &fine.geometry) {
                    (PatchGeometry::TwoDim(cg), PatchGeometry::TwoDim(fg)) => {
                        let cm = cg.metric.as_mut().expect("manifold patch has a metric");
                        let fm = fg.metric.as_ref().expect("manifold patch has a metric");
                        cm.average_area_from_fine(fm, origin, r, (config.mx / 2, config.my / 2));
                    }
                    (PatchGeometry::ThreeDim(cg), PatchGeometry::ThreeDim(fg)) => {
                        assert!(config.mz % 2 == 0);
                        let cm = cg.metric.as_mut().expect("manifold patch has a metric");
                        let fm = fg.metric.as_ref().expect("manifold patch has a metric");
                        cm.average_volume_from_fine(
                            fm,
                            origin,
                            r,
                            (config.mx / 2, config.my / 2, config.mz / 2),
                        );
                    }
                    _ => panic!("sibling dimension mismatch"),
                }
            }

            // Registers read cell areas, so refresh them from the averaged
            // metric.
            if let Some(registers) = patch.registers.as_mut() {
                if let PatchGeometry::TwoDim(g) = &patch.geometry {
                    registers.setup(config, (g.dx, g.dy), g.metric.as_ref());
                }
            }
        }
        patch
    }


    /**
     * Re-establish a patch in place after regrid, preserving the caller's
     * user / solver data associations.
     */
    pub fn rebuild(
        &mut self,
        config: &Config,
        leaf: &LogicalPatch,
        brick: Option<&Brick>,
        map: Option<&dyn CoordinateMap>,
        mode: BuildMode,
    ) {
        let user_data = self.user_data.take();
        let solver_data = self.solver_data.take();
        *self = Self::build(config, leaf, brick, map, mode);
        self.user_data = user_data;
        self.solver_data = solver_data;
    }


    fn build_geometry(
        config: &Config,
        leaf: &LogicalPatch,
        brick: Option<&Brick>,
        map: Option<&dyn CoordinateMap>,
    ) -> PatchGeometry {
        let (xlower, ylower, zlower, xupper, yupper, zupper) = if config.manifold {
            (
                leaf.xlower, leaf.ylower, leaf.zlower,
                leaf.xupper, leaf.yupper, leaf.zupper,
            )
        } else {
            let normalize = |x, y, z| match brick {
                Some(b) => b.normalize(leaf.blockno, x, y, z),
                None => (x, y, z),
            };
            let (xl, yl, zl) = normalize(leaf.xlower, leaf.ylower, leaf.zlower);
            let (xu, yu, zu) = normalize(leaf.xupper, leaf.yupper, leaf.zupper);
            (
                config.ax + (config.bx - config.ax) * xl,
                config.ay + (config.by - config.ay) * yl,
                config.az + (config.bz - config.az) * zl,
                config.ax + (config.bx - config.ax) * xu,
                config.ay + (config.by - config.ay) * yu,
                config.az + (config.bz - config.az) * zu,
            )
        };

        let dx = (xupper - xlower) / config.mx as f64;
        let dy = (yupper - ylower) / config.my as f64;

        // Ghost payloads may carry per-cell areas (needed where the remote
        // patch averaged them from finer levels); the unpack overwrites the
        // area plane after this build.
        match config.dim {
            Dim::Two => {
                let metric = if config.manifold {
                    let map = map.expect("manifold mode requires a coordinate map");
                    Some(Metric2d::build(config, leaf.blockno, xlower, ylower, dx, dy, map))
                } else {
                    None
                };
                PatchGeometry::TwoDim(Geometry2d {
                    xlower, ylower, xupper, yupper, dx, dy, metric,
                })
            }
            Dim::Three => {
                let dz = (zupper - zlower) / config.mz as f64;
                let metric = if config.manifold {
                    let map = map.expect("manifold mode requires a coordinate map");
                    Some(Metric3d::build(
                        config,
                        leaf.blockno,
                        (xlower, ylower, zlower),
                        (dx, dy, dz),
                        map,
                    ))
                } else {
                    None
                };
                PatchGeometry::ThreeDim(Geometry3d {
                    xlower, ylower, zlower, xupper, yupper, zupper, dx, dy, dz, metric,
                })
            }
        }
    }


    // ------------------------------------------------------------------------
    // time stepping


    /**
     * Snapshot the solution (and the aux array, when it is time dependent)
     * so the step can be retried.
     */
    pub fn save_step(&mut self, config: &Config) {
        let save = self.griddata_save.as_mut().expect("ghost patches are not stepped");
        *save = self.griddata.clone();

        if config.save_aux {
            let aux = self.aux.as_ref().expect("save_aux requires maux > 0");
            self.aux_save = Some(aux.clone());
        }
    }


    /**
     * Restore the snapshot taken by `save_step` before retaking a step.
     */
    pub fn restore_step(&mut self, config: &Config) {
        let save = self.griddata_save.as_ref().expect("ghost patches are not stepped");
        self.griddata = save.clone();

        if config.save_aux {
            let saved = self.aux_save.as_ref().expect("save_aux requires a saved aux array");
            self.aux = Some(saved.clone());
        }
    }


    /**
     * Record the current solution as the previous-step state; sub-cycled
     * time interpolation draws on this buffer.
     */
    pub fn save_current_step(&mut self) {
        let last = self.griddata_last.as_mut().expect("ghost patches are not stepped");
        *last = self.griddata.clone();
    }


    /**
     * Populate the time-interpolated grid at fraction `alpha` between the
     * previous and current steps. Only the interior shell that coarse
     * exchanges actually read is interpolated; ghost cells of the current
     * step are not yet valid at this point in a sub-cycle. A nonzero error
     * code from the kernel is fatal.
     */
    pub fn setup_timeinterp(&mut self, config: &Config, table: &KernelTable, alpha: f64) {
        let mint = config.interp_stencil_width / 2 + 1;

        let mut wg = config.mx * config.my;
        let mut hole = (config.mx - 2 * mint) * (config.my - 2 * mint);
        if config.dim == Dim::Three {
            wg *= config.mz;
            hole *= config.mz;
        }
        assert!(hole >= 0, "time interpolation hole has negative extent");

        let psize = (wg - hole) as usize * config.meqn;
        assert!(psize > 0);

        let qcurr = &self.griddata;
        let qlast = self.griddata_last.as_ref().expect("subcycling requires griddata_last");
        let qinterp = self
            .griddata_time_interpolated
            .as_mut()
            .expect("subcycling requires the time-interpolated grid");

        let ierror = (table.timeinterp)(config, qcurr, qlast, qinterp, alpha, psize);
        if ierror != 0 {
            panic!("timeinterp kernel failed: ierror = {}", ierror);
        }
    }


    // ------------------------------------------------------------------------
    // data access


    /**
     * The synchronized data source for ghost filling: the time-interpolated
     * grid at an intermediate level, the current solution otherwise.
     */
    pub fn q_time_sync(&self, time_interp: bool) -> &GridData {
        if time_interp {
            self.griddata_time_interpolated
                .as_ref()
                .expect("time-interpolated exchange requires subcycling")
        } else {
            &self.griddata
        }
    }


    pub fn q_time_sync_mut(&mut self, time_interp: bool) -> &mut GridData {
        if time_interp {
            self.griddata_time_interpolated
                .as_mut()
                .expect("time-interpolated exchange requires subcycling")
        } else {
            &mut self.griddata
        }
    }


    pub fn aux_data(&self) -> &GridData {
        self.aux.as_ref().expect("aux data was not configured (maux = 0)")
    }


    pub fn rhs_data(&self) -> &GridData {
        self.rhs.as_ref().expect("rhs data was not configured (rhs_fields = 0)")
    }


    pub fn error_data(&self) -> &GridData {
        self.griderror.as_ref().expect("error data requires compute_error")
    }


    /**
     * Per-cell areas (2d manifold patches only).
     */
    pub fn area(&self) -> Option<&GridData> {
        match &self.geometry {
            PatchGeometry::TwoDim(g) => g.metric.as_ref().map(|m| &m.area),
            PatchGeometry::ThreeDim(_) => None,
        }
    }


    /**
     * Per-cell volumes (3d manifold patches only).
     */
    pub fn volume(&self) -> Option<&GridData> {
        match &self.geometry {
            PatchGeometry::TwoDim(_) => None,
            PatchGeometry::ThreeDim(g) => g.metric.as_ref().map(|m| &m.volume),
        }
    }


    /**
     * The area or volume weights for manifold-weighted averaging,
     * whichever variant is live.
     */
    pub fn cell_weights(&self) -> Option<&GridData> {
        self.area().or_else(|| self.volume())
    }


    pub fn cell_weights_mut(&mut self) -> Option<&mut GridData> {
        match &mut self.geometry {
            PatchGeometry::TwoDim(g) => g.metric.as_mut().map(|m| &mut m.area),
            PatchGeometry::ThreeDim(g) => g.metric.as_mut().map(|m| &mut m.volume),
        }
    }


    pub fn spacing(&self) -> (f64, f64, f64) {
        match &self.geometry {
            PatchGeometry::TwoDim(g) => (g.dx, g.dy, 0.0),
            PatchGeometry::ThreeDim(g) => (g.dx, g.dy, g.dz),
        }
    }


    pub fn lower(&self) -> (f64, f64, f64) {
        match &self.geometry {
            PatchGeometry::TwoDim(g) => (g.xlower, g.ylower, 0.0),
            PatchGeometry::ThreeDim(g) => (g.xlower, g.ylower, g.zlower),
        }
    }
}




/**
 * Serialized extent of one whole-patch solution grid, in elements. This is
 * the unit the partition pack transfers per patch.
 */
pub fn patch_size(config: &Config) -> usize {
    let nx = (config.mx + 2 * config.mbc) as usize;
    let ny = (config.my + 2 * config.mbc) as usize;
    match config.dim {
        Dim::Two => nx * ny * config.meqn,
        Dim::Three => nx * ny * (config.mz + 2 * config.mbc) as usize * config.meqn,
    }
}




/**
 * Coarse interior index of the first cell covered by sibling `igrid`, in
 * z-order: bit 0 selects the upper half in i, bit 1 in j, bit 2 in k.
 */
pub fn sibling_origin(config: &Config, igrid: usize) -> Index {
    assert!(igrid < config.dim.num_siblings());
    let i = 1 + (igrid as i64 & 1) * config.mx / 2;
    let j = 1 + ((igrid as i64 >> 1) & 1) * config.my / 2;
    let k = match config.dim {
        Dim::Two => 0,
        Dim::Three => 1 + ((igrid as i64 >> 2) & 1) * config.mz / 2,
    };
    (i, j, k)
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{patch_size, sibling_origin, BuildMode, Brick, LogicalPatch, Patch};
    use crate::config::Config;
    use crate::metric::IdentityMap;

    fn unit_leaf() -> LogicalPatch {
        LogicalPatch {
            blockno: 0,
            patchno: 0,
            level: 0,
            xlower: 0.0,
            ylower: 0.0,
            zlower: 0.0,
            xupper: 1.0,
            yupper: 1.0,
            zupper: 1.0,
        }
    }

    #[test]
    fn grid_index_range_honors_the_ghost_margin() {
        let config = Config::basic2d(8, 8, 2, 1);
        for &mode in &[BuildMode::ForUpdate, BuildMode::ForGhost { packed_area: false }] {
            let patch = Patch::build(&config, &unit_leaf(), None, None, mode);
            assert_eq!(patch.griddata.extent().start(), (-1, -1, 0));
            assert_eq!(patch.griddata.extent().end(), (11, 11, 1));
        }
    }

    #[test]
    fn basic_2d_scenario() {
        // mx = my = 8, mbc = 2, meqn = 1, no manifold: the solution grid
        // holds (8+4) x (8+4) x 1 = 144 values and dx spans the domain.
        let config = Config::basic2d(8, 8, 2, 1);
        let patch = Patch::build(&config, &unit_leaf(), None, None, BuildMode::ForUpdate);
        assert_eq!(patch.griddata.len(), 144);
        assert_eq!(patch_size(&config), 144);
        let (dx, dy, _) = patch.spacing();
        assert!((dx - 1.0 / 8.0).abs() < 1e-14);
        assert!((dy - 1.0 / 8.0).abs() < 1e-14);
    }

    #[test]
    fn optional_buffers_follow_the_configuration() {
        let mut config = Config::basic2d(8, 8, 2, 2);
        config.maux = 3;
        config.save_aux = true;
        config.subcycle = true;
        config.compute_error = true;
        config.rhs_fields = 1;
        config.time_sync = true;
        assert!(config.validate().is_ok());

        let patch = Patch::build(&config, &unit_leaf(), None, None, BuildMode::ForUpdate);
        assert!(patch.aux.is_some());
        assert!(patch.aux_save.is_some());
        assert!(patch.griddata_time_interpolated.is_some());
        assert!(patch.griderror.is_some());
        assert!(patch.rhs.is_some());
        assert!(patch.elliptic_soln.is_some());
        assert!(patch.registers.is_some());
        assert!(patch.griddata_last.is_some());

        // Ghost builds skip the step-retry buffers.
        let ghost = Patch::build(
            &config,
            &unit_leaf(),
            None,
            None,
            BuildMode::ForGhost { packed_area: false },
        );
        assert!(ghost.griddata_last.is_none());
        assert!(ghost.griddata_save.is_none());
    }

    #[test]
    fn time_sync_disabled_allocates_no_registers() {
        let config = Config::basic2d(8, 8, 2, 1);
        let patch = Patch::build(&config, &unit_leaf(), None, None, BuildMode::ForUpdate);
        assert!(patch.registers.is_none());
    }

    #[test]
    fn restore_after_save_is_the_identity() {
        let config = Config::basic2d(8, 8, 2, 1);
        let mut patch = Patch::build(&config, &unit_leaf(), None, None, BuildMode::ForUpdate);
        for (n, x) in patch.griddata.data_mut().iter_mut().enumerate() {
            *x = (n as f64).sin();
        }
        let before = patch.griddata.clone();
        patch.save_step(&config);
        patch.restore_step(&config);
        assert_eq!(patch.griddata, before);
    }

    #[test]
    fn brick_blocks_map_into_the_physical_box() {
        let mut config = Config::basic2d(8, 8, 2, 1);
        config.ax = -2.0;
        config.bx = 2.0;
        let brick = Brick { shape: (2, 1, 1) };

        // Block 1 of a 2x1 brick covers the right half of the domain.
        let leaf = LogicalPatch { blockno: 1, ..unit_leaf() };
        let patch = Patch::build(&config, &leaf, Some(&brick), None, BuildMode::ForUpdate);
        let (xlower, _, _) = patch.lower();
        assert!((xlower - 0.0).abs() < 1e-14);
        let (dx, _, _) = patch.spacing();
        assert!((dx - 2.0 / 8.0).abs() < 1e-14);
    }

    #[test]
    fn manifold_mode_builds_a_metric() {
        let mut config = Config::basic2d(8, 8, 2, 1);
        config.manifold = true;
        let patch = Patch::build(
            &config,
            &unit_leaf(),
            None,
            Some(&IdentityMap),
            BuildMode::ForUpdate,
        );
        let area = patch.area().expect("manifold patch stores areas");
        assert!((area.get(0, (1, 1, 0)) - 0.125 * 0.125).abs() < 1e-14);
        assert!(patch.volume().is_none());
    }

    #[test]
    fn sibling_origins_are_z_ordered() {
        let config = Config::basic2d(8, 8, 2, 1);
        assert_eq!(sibling_origin(&config, 0), (1, 1, 0));
        assert_eq!(sibling_origin(&config, 1), (5, 1, 0));
        assert_eq!(sibling_origin(&config, 2), (1, 5, 0));
        assert_eq!(sibling_origin(&config, 3), (5, 5, 0));
    }
}
