use crate::error::Error;
use crate::index_box::{range2d, range3d, IndexBox};




/**
 * Spatial dimension of the mesh. Fixed for the lifetime of a run; every
 * patch built from a configuration carries exactly one of the 2d or 3d
 * geometry sub-records.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dim {
    Two,
    Three,
}

impl Dim {
    pub fn rank(self) -> u32 {
        match self {
            Dim::Two => 2,
            Dim::Three => 3,
        }
    }

    /// Number of sibling patches created when a leaf is refined.
    pub fn num_siblings(self) -> usize {
        match self {
            Dim::Two => 4,
            Dim::Three => 8,
        }
    }

    pub fn num_faces(self) -> usize {
        match self {
            Dim::Two => 4,
            Dim::Three => 6,
        }
    }

    pub fn num_corners(self) -> usize {
        match self {
            Dim::Two => 4,
            Dim::Three => 8,
        }
    }
}




/**
 * Which generation of solver kernels to install in the indirection table.
 * The two versions differ slightly in their patch-data conventions and are
 * supported side by side; the selection is made once at setup.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelVersion {
    V4,
    V5,
}




#[derive(Clone, Debug)]

/**
 * Process-wide configuration, read by every build / exchange / pack call.
 * There are no ambient globals: the driver constructs one of these at setup
 * and passes it by reference everywhere.
 */
pub struct Config {
    pub dim: Dim,
    pub kernel_version: KernelVersion,

    /// Interior cell counts per patch.
    pub mx: i64,
    pub my: i64,
    pub mz: i64,

    /// Ghost cell margin on every side of every axis.
    pub mbc: i64,

    /// Field counts: solution, auxiliary, and elliptic / right-hand-side.
    pub meqn: usize,
    pub maux: usize,
    pub rhs_fields: usize,

    /// Stencil width for coarse-to-fine ghost interpolation.
    pub interp_stencil_width: i64,

    /// Refinement ratio between adjacent levels.
    pub refratio: i64,

    /// Non-Cartesian geometry: patches carry metric terms and averaging is
    /// area / volume weighted.
    pub manifold: bool,

    /// Finer levels advance with smaller time steps; patches carry a
    /// time-interpolated buffer for intermediate-time ghost exchange.
    pub subcycle: bool,

    /// Always fill ghost cells from the synchronized data source, even at
    /// intermediate time levels. When false, intermediate-level ghost cells
    /// are produced by advancing the solution instead.
    pub timeinterp2fillghost: bool,

    /// Patches carry error / reference buffers.
    pub compute_error: bool,

    /// The aux array is time dependent and participates in step retry.
    pub save_aux: bool,

    /// Coarse-fine interfaces carry conservation registers, corrected at
    /// every time synchronization point.
    pub time_sync: bool,

    /// Include per-cell area / volume in remote ghost patch payloads.
    pub ghost_patch_pack_area: bool,

    /// Number of extra fields delegated to the auxiliary packer hook.
    pub ghost_patch_pack_numextrafields: usize,

    /// Physical domain box for the Cartesian (non-manifold) mapping.
    pub ax: f64,
    pub bx: f64,
    pub ay: f64,
    pub by: f64,
    pub az: f64,
    pub bz: f64,

    /// Tagging thresholds. A negative refine threshold means always refine;
    /// a coarsen threshold <= 0 means never coarsen.
    pub refine_threshold: f64,
    pub coarsen_threshold: f64,
}




// ============================================================================
impl Config {


    /**
     * A baseline 2d configuration; drivers override fields as needed.
     */
    pub fn basic2d(mx: i64, my: i64, mbc: i64, meqn: usize) -> Self {
        Self {
            dim: Dim::Two,
            kernel_version: KernelVersion::V4,
            mx,
            my,
            mz: 1,
            mbc,
            meqn,
            maux: 0,
            rhs_fields: 0,
            interp_stencil_width: 3,
            refratio: 2,
            manifold: false,
            subcycle: false,
            timeinterp2fillghost: true,
            compute_error: false,
            save_aux: false,
            time_sync: false,
            ghost_patch_pack_area: false,
            ghost_patch_pack_numextrafields: 0,
            ax: 0.0,
            bx: 1.0,
            ay: 0.0,
            by: 1.0,
            az: 0.0,
            bz: 1.0,
            refine_threshold: -1.0,
            coarsen_threshold: 0.0,
        }
    }


    pub fn basic3d(mx: i64, my: i64, mz: i64, mbc: i64, meqn: usize) -> Self {
        Self {
            dim: Dim::Three,
            mz,
            ..Self::basic2d(mx, my, mbc, meqn)
        }
    }


    /**
     * Reject configurations the core cannot honor. Capability gaps are
     * reported here, at setup, rather than discovered mid-exchange: the 3d
     * kernel table only exists for version 4, conservation registers are 2d
     * only, and the ghost packing hole must have non-negative extent (the
     * hole is `mx - 2 mint` per axis with `mint = refratio * mbc`, so small
     * patches combined with wide ghost margins are rejected rather than
     * assumed safe).
     */
    pub fn validate(&self) -> Result<(), Error> {
        if self.dim == Dim::Three && self.kernel_version == KernelVersion::V5 {
            return Err(Error::UnsupportedKernelVersion(3, 5));
        }
        if self.dim == Dim::Three && self.time_sync {
            return Err(Error::UnsupportedTimeSync(3));
        }
        if self.mx < 1 || self.my < 1 || (self.dim == Dim::Three && self.mz < 1) {
            return Err(Error::InvalidOption("mx/my/mz", "patch size must be positive".into()));
        }
        if self.mbc < 1 {
            return Err(Error::InvalidOption("mbc", "ghost margin must be positive".into()));
        }
        if self.meqn < 1 {
            return Err(Error::InvalidOption("meqn", "at least one field is required".into()));
        }
        if self.refratio < 2 {
            return Err(Error::InvalidOption("refratio", "refinement ratio must be >= 2".into()));
        }
        if self.interp_stencil_width < 2 {
            return Err(Error::InvalidOption(
                "interp_stencil_width",
                "stencil must support at least second order".into(),
            ));
        }

        let mint = self.refratio * self.mbc;
        let mut nx = self.mx.min(self.my);
        if self.dim == Dim::Three {
            nx = nx.min(self.mz);
        }
        if nx < 2 * mint {
            return Err(Error::NegativePackingHole(nx, mint));
        }

        let mint_interp = self.interp_stencil_width / 2 + 1;
        if nx < 2 * mint_interp {
            return Err(Error::NegativePackingHole(nx, mint_interp));
        }
        Ok(())
    }


    /**
     * The index box of a patch interior: `1 .. n + 1` on each axis.
     */
    pub fn interior_box(&self) -> IndexBox {
        match self.dim {
            Dim::Two => range2d(1..self.mx + 1, 1..self.my + 1),
            Dim::Three => range3d(1..self.mx + 1, 1..self.my + 1, 1..self.mz + 1),
        }
    }


    /**
     * The index box of a patch including its ghost margin:
     * `1 - mbc .. n + mbc + 1` on each axis.
     */
    pub fn grid_box(&self) -> IndexBox {
        self.interior_box().extend_all(self.mbc)
    }
}
