use crate::config::Config;
use crate::grid_data::GridData;
use crate::index_box::Index;




/**
 * The geometry kernel seam. Under manifold mode each patch carries metric
 * terms (areas / volumes, face normals and tangents, edge lengths,
 * curvature) computed from a caller-supplied coordinate map. The map takes
 * logical block coordinates to physical space; the metric subsystem owns
 * the patch-side storage and the build / average lifecycle, while the map
 * itself belongs to the external geometry layer.
 */
pub trait CoordinateMap {
    /// Physical position of a logical point within the given block.
    fn map(&self, block: usize, x: f64, y: f64, z: f64) -> [f64; 3];

    /// Scalar curvature at a logical point. External geometry kernels
    /// override this; the default is a flat map.
    fn curvature(&self, _block: usize, _x: f64, _y: f64) -> f64 {
        0.0
    }
}




/**
 * The identity map: logical coordinates are physical coordinates. Useful
 * for exercising manifold-mode storage on a Cartesian domain.
 */
pub struct IdentityMap;

impl CoordinateMap for IdentityMap {
    fn map(&self, _block: usize, x: f64, y: f64, z: f64) -> [f64; 3] {
        [x, y, z]
    }
}




#[derive(Clone, Debug)]

/**
 * Metric terms for one 2d patch on a manifold: cell areas, edge lengths and
 * face normals / tangents on the two face families, cell-centered surface
 * normals and curvature. Areas extend through the ghost margin because
 * fine-to-coarse ghost averaging is area weighted.
 */
pub struct Metric2d {
    pub area: GridData,
    /// Field 0: x-face edge length, field 1: y-face edge length.
    pub edge_lengths: GridData,
    pub xnormals: GridData,
    pub ynormals: GridData,
    pub xtangents: GridData,
    pub ytangents: GridData,
    pub surf_normals: GridData,
    pub curvature: GridData,
}




#[derive(Clone, Debug)]

/**
 * Metric terms for one 3d patch: cell volumes and face areas on the three
 * face families.
 */
pub struct Metric3d {
    pub volume: GridData,
    /// Field d: area of the lower face normal to axis d.
    pub face_areas: GridData,
}




// ============================================================================
fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(a: [f64; 3]) -> f64 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

fn normalize(a: [f64; 3]) -> [f64; 3] {
    let n = norm(a);
    if n == 0.0 {
        [0.0, 0.0, 0.0]
    } else {
        [a[0] / n, a[1] / n, a[2] / n]
    }
}

/// Area of the mapped quadrilateral with the given corners, split into two
/// triangles.
fn quad_area(p00: [f64; 3], p10: [f64; 3], p01: [f64; 3], p11: [f64; 3]) -> f64 {
    0.5 * norm(cross(sub(p10, p00), sub(p01, p00)))
        + 0.5 * norm(cross(sub(p10, p11), sub(p01, p11)))
}




// ============================================================================
impl Metric2d {


    /**
     * Compute all metric terms for a patch with the given logical bounds.
     * Detailed geometry is passed in so that the metric subsystem does not
     * need to know about the patch record. Cell (i, j) spans
     * `[xlower + (i-1) dx, xlower + i dx]`, matching the interior-at-1
     * index convention.
     */
    pub fn build(
        config: &Config,
        block: usize,
        xlower: f64,
        ylower: f64,
        dx: f64,
        dy: f64,
        map: &dyn CoordinateMap,
    ) -> Self {
        let grid = config.grid_box();
        let node = |i: i64, j: i64| {
            let x = xlower + (i - 1) as f64 * dx;
            let y = ylower + (j - 1) as f64 * dy;
            map.map(block, x, y, 0.0)
        };

        let mut area = GridData::define(grid.clone(), 1);
        let mut edge_lengths = GridData::define(grid.clone(), 2);
        let mut xnormals = GridData::define(grid.clone(), 3);
        let mut ynormals = GridData::define(grid.clone(), 3);
        let mut xtangents = GridData::define(grid.clone(), 3);
        let mut ytangents = GridData::define(grid.clone(), 3);
        let mut surf_normals = GridData::define(grid.clone(), 3);
        let mut curvature = GridData::define(grid.clone(), 1);

        for index in grid.iter() {
            let (i, j, _) = index;
            let p00 = node(i, j);
            let p10 = node(i + 1, j);
            let p01 = node(i, j + 1);
            let p11 = node(i + 1, j + 1);

            area.set(0, index, quad_area(p00, p10, p01, p11));
            edge_lengths.set(0, index, norm(sub(p01, p00)));
            edge_lengths.set(1, index, norm(sub(p10, p00)));

            let sn = normalize(cross(sub(p10, p00), sub(p01, p00)));
            let xt = normalize(sub(p01, p00));
            let yt = normalize(sub(p10, p00));
            let xn = normalize(cross(xt, sn));
            let yn = normalize(cross(sn, yt));

            for c in 0..3 {
                surf_normals.set(c, index, sn[c]);
                xtangents.set(c, index, xt[c]);
                ytangents.set(c, index, yt[c]);
                xnormals.set(c, index, xn[c]);
                ynormals.set(c, index, yn[c]);
            }

            let xc = xlower + (i as f64 - 0.5) * dx;
            let yc = ylower + (j as f64 - 0.5) * dy;
            curvature.set(0, index, map.curvature(block, xc, yc));
        }

        Self {
            area,
            edge_lengths,
            xnormals,
            ynormals,
            xtangents,
            ytangents,
            surf_normals,
            curvature,
        }
    }


    /**
     * Replace interior cell areas with the exact sum of the covering fine
     * cell areas. Areas on a manifold are not derivable from the coarse
     * geometry alone: coarsening must respect the fine-grid integration or
     * the conservation correction loses its footing. `origin` is the coarse
     * interior index of the sibling's first cell and `r` the refinement
     * ratio.
     */
    pub fn average_area_from_fine(&mut self, fine: &Metric2d, origin: Index, r: i64, half: (i64, i64)) {
        for ci in 0..half.0 {
            for cj in 0..half.1 {
                let coarse_index = (origin.0 + ci, origin.1 + cj, 0);
                let mut sum = 0.0;
                for li in 0..r {
                    for lj in 0..r {
                        sum += fine.area.get(0, (1 + ci * r + li, 1 + cj * r + lj, 0));
                    }
                }
                self.area.set(0, coarse_index, sum);
            }
        }
    }
}




// ============================================================================
impl Metric3d {


    /**
     * Compute cell volumes and face areas from the map's Jacobian,
     * evaluated by centered differences at cell centers. Extruded and
     * octree meshes share this path.
     */
    pub fn build(
        config: &Config,
        block: usize,
        lower: (f64, f64, f64),
        spacing: (f64, f64, f64),
        map: &dyn CoordinateMap,
    ) -> Self {
        let grid = config.grid_box();
        let (dx, dy, dz) = spacing;

        let mut volume = GridData::define(grid.clone(), 1);
        let mut face_areas = GridData::define(grid.clone(), 3);

        for index in grid.iter() {
            let (i, j, k) = index;
            let xc = lower.0 + (i as f64 - 0.5) * dx;
            let yc = lower.1 + (j as f64 - 0.5) * dy;
            let zc = lower.2 + (k as f64 - 0.5) * dz;

            let at = |x: f64, y: f64, z: f64| map.map(block, x, y, z);
            let tx = sub(at(xc + 0.5 * dx, yc, zc), at(xc - 0.5 * dx, yc, zc));
            let ty = sub(at(xc, yc + 0.5 * dy, zc), at(xc, yc - 0.5 * dy, zc));
            let tz = sub(at(xc, yc, zc + 0.5 * dz), at(xc, yc, zc - 0.5 * dz));

            let det = tx[0] * (ty[1] * tz[2] - ty[2] * tz[1])
                - tx[1] * (ty[0] * tz[2] - ty[2] * tz[0])
                + tx[2] * (ty[0] * tz[1] - ty[1] * tz[0]);

            volume.set(0, index, det.abs());
            face_areas.set(0, index, norm(cross(ty, tz)));
            face_areas.set(1, index, norm(cross(tz, tx)));
            face_areas.set(2, index, norm(cross(tx, ty)));
        }

        Self { volume, face_areas }
    }


    /**
     * Replace interior cell volumes with the sum of the covering fine cell
     * volumes (the 3d analogue of `Metric2d::average_area_from_fine`).
     */
    pub fn average_volume_from_fine(
        &mut self,
        fine: &Metric3d,
        origin: Index,
        r: i64,
        half: (i64, i64, i64),
    ) {
        for ci in 0..half.0 {
            for cj in 0..half.1 {
                for ck in 0..half.2 {
                    let coarse_index = (origin.0 + ci, origin.1 + cj, origin.2 + ck);
                    let mut sum = 0.0;
                    for li in 0..r {
                        for lj in 0..r {
                            for lk in 0..r {
                                sum += fine.volume.get(
                                    0,
                                    (1 + ci * r + li, 1 + cj * r + lj, 1 + ck * r + lk),
                                );
                            }
                        }
                    }
                    self.volume.set(0, coarse_index, sum);
                }
            }
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{CoordinateMap, IdentityMap, Metric2d, Metric3d};
    use crate::config::Config;

    struct Stretch2x;

    impl CoordinateMap for Stretch2x {
        fn map(&self, _block: usize, x: f64, y: f64, z: f64) -> [f64; 3] {
            [2.0 * x, y, z]
        }
    }

    #[test]
    fn identity_map_gives_cartesian_areas() {
        let config = Config::basic2d(8, 8, 2, 1);
        let m = Metric2d::build(&config, 0, 0.0, 0.0, 0.125, 0.125, &IdentityMap);
        let a = m.area.get(0, (4, 4, 0));
        assert!((a - 0.125 * 0.125).abs() < 1e-14);
        assert!((m.edge_lengths.get(0, (1, 1, 0)) - 0.125).abs() < 1e-14);
        assert_eq!(m.curvature.get(0, (1, 1, 0)), 0.0);
    }

    #[test]
    fn stretched_map_scales_areas_and_normals() {
        let config = Config::basic2d(8, 8, 2, 1);
        let m = Metric2d::build(&config, 0, 0.0, 0.0, 0.125, 0.125, &Stretch2x);
        assert!((m.area.get(0, (2, 7, 0)) - 2.0 * 0.125 * 0.125).abs() < 1e-14);
        // x-face normals still point along x.
        assert!((m.xnormals.get(0, (3, 3, 0)) - 1.0).abs() < 1e-12);
        assert!(m.xnormals.get(1, (3, 3, 0)).abs() < 1e-12);
    }

    #[test]
    fn fine_areas_sum_into_coarse_cells() {
        let coarse_config = Config::basic2d(8, 8, 2, 1);
        // The fine sibling covers one quadrant of the coarse patch at twice
        // the resolution.
        let mut coarse = Metric2d::build(&coarse_config, 0, 0.0, 0.0, 0.125, 0.125, &IdentityMap);
        let fine = Metric2d::build(&coarse_config, 0, 0.0, 0.0, 0.0625, 0.0625, &IdentityMap);

        let before: f64 = (0..4)
            .flat_map(|ci| (0..4).map(move |cj| (ci, cj)))
            .map(|(ci, cj)| coarse.area.get(0, (1 + ci, 1 + cj, 0)))
            .sum();

        coarse.average_area_from_fine(&fine, (1, 1, 0), 2, (4, 4));

        let after: f64 = (0..4)
            .flat_map(|ci| (0..4).map(move |cj| (ci, cj)))
            .map(|(ci, cj)| coarse.area.get(0, (1 + ci, 1 + cj, 0)))
            .sum();

        assert!((before - after).abs() < 1e-13);
    }

    #[test]
    fn identity_map_gives_cartesian_volumes() {
        let config = Config::basic3d(8, 8, 8, 2, 1);
        let m = Metric3d::build(&config, 0, (0.0, 0.0, 0.0), (0.25, 0.25, 0.25), &IdentityMap);
        assert!((m.volume.get(0, (4, 4, 4)) - 0.25_f64.powi(3)).abs() < 1e-14);
        assert!((m.face_areas.get(2, (1, 1, 1)) - 0.25 * 0.25).abs() < 1e-14);
    }
}
