use crate::config::Config;
use crate::grid_data::GridData;
use crate::index_box::Index;
use crate::metric::Metric2d;




/**
 * Whether a register payload buffer is being serialized from, or
 * deserialized into, the local registers. The mode is explicit on the wire
 * path so a remote exchange can never be ambiguous about direction.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterPackMode {
    Pack,
    Unpack,
}




/**
 * Face numbering follows the usual quadrant convention: 0 = x-lower,
 * 1 = x-upper, 2 = y-lower, 3 = y-upper.
 */
pub const NUM_FACES_2D: usize = 4;

fn face_sign(face: usize) -> f64 {
    // Lower faces carry inflow with a positive sign in the conservative
    // update; upper faces the opposite.
    match face {
        0 | 2 => 1.0,
        1 | 3 => -1.0,
        _ => panic!("invalid face number {}", face),
    }
}




#[derive(Clone, Debug)]

/**
 * Flux accumulators for one patch face. All flux entries are integrated
 * over time and edge length (callers fold `dt * edge_length` into the
 * accumulation weight), so the synchronization correction reduces to a
 * division by cell area. Four `meqn`-vector arrays are kept per face (the
 * plus / minus fine-side accumulations and the front / back coarse-side
 * fluxes, supporting fluctuation-form solvers), plus the scalar edge length
 * and adjacent cell area: `4 meqn + 2` arrays of the face extent.
 */
pub struct FaceRegister {
    meqn: usize,
    n: usize,
    pub fine_plus: Vec<f64>,
    pub fine_minus: Vec<f64>,
    pub coarse_front: Vec<f64>,
    pub coarse_back: Vec<f64>,
    pub edge_length: Vec<f64>,
    pub cell_area: Vec<f64>,
}




// ============================================================================
impl FaceRegister {

    fn new(meqn: usize, n: usize) -> Self {
        Self {
            meqn,
            n,
            fine_plus: vec![0.0; meqn * n],
            fine_minus: vec![0.0; meqn * n],
            coarse_front: vec![0.0; meqn * n],
            coarse_back: vec![0.0; meqn * n],
            edge_length: vec![0.0; n],
            cell_area: vec![0.0; n],
        }
    }

    pub fn extent(&self) -> usize {
        self.n
    }

    /// Number of payload elements this face contributes to a register pack.
    fn elems(&self) -> usize {
        (4 * self.meqn + 2) * self.n
    }

    fn reset(&mut self) {
        for x in self
            .fine_plus
            .iter_mut()
            .chain(self.fine_minus.iter_mut())
            .chain(self.coarse_front.iter_mut())
            .chain(self.coarse_back.iter_mut())
        {
            *x = 0.0;
        }
    }

    /// Net time-and-length integrated flux mismatch for (field, cell):
    /// fine accumulation minus coarse contribution.
    fn mismatch(&self, m: usize, cell: usize) -> f64 {
        let k = m * self.n + cell;
        (self.fine_plus[k] + self.fine_minus[k]) - (self.coarse_front[k] + self.coarse_back[k])
    }
}




#[derive(Clone, Debug)]

/**
 * Conservation registers for the four faces of one 2d patch. A register
 * accumulates, during the fine-grid steps, the net flux crossing a
 * coarse-fine interface at the fine resolution; at a time synchronization
 * point the correction subtracts the coarse-computed flux and adds the fine
 * accumulation, restoring exact conservation despite the resolution
 * mismatch. Registers are reset immediately after each application.
 */
pub struct Registers {
    meqn: usize,
    mx: i64,
    my: i64,
    pub faces: Vec<FaceRegister>,
}




// ============================================================================
impl Registers {


    pub fn new(config: &Config) -> Self {
        let meqn = config.meqn;
        let (mx, my) = (config.mx, config.my);
        let faces = (0..NUM_FACES_2D)
            .map(|face| {
                let n = if face < 2 { my } else { mx } as usize;
                FaceRegister::new(meqn, n)
            })
            .collect();
        Self { meqn, mx, my, faces }
    }


    /**
     * Fill edge lengths and adjacent cell areas, from the metric terms
     * under manifold mode or from the uniform spacing otherwise. Called on
     * every patch build; accumulators are untouched.
     */
    pub fn setup(&mut self, config: &Config, spacing: (f64, f64), metric: Option<&Metric2d>) {
        let (dx, dy) = spacing;
        for face in 0..NUM_FACES_2D {
            let n = self.faces[face].n;
            for cell in 0..n {
                let index = boundary_cell(face, cell, self.mx, self.my);
                let (el, area) = match metric {
                    Some(m) => {
                        let family = if face < 2 { 0 } else { 1 };
                        (m.edge_lengths.get(family, index), m.area.get(0, index))
                    }
                    None => {
                        let el = if face < 2 { dy } else { dx };
                        (el, dx * dy)
                    }
                };
                self.faces[face].edge_length[cell] = el;
                self.faces[face].cell_area[cell] = area;
            }
        }
    }


    /**
     * Accumulate a fine-grid flux through a coarse face cell. `flux` has
     * `meqn` entries; `weight` carries `dt_fine * fine_edge_length`.
     */
    pub fn accumulate_fine(&mut self, face: usize, cell: usize, flux: &[f64], weight: f64) {
        let fr = &mut self.faces[face];
        assert!(flux.len() == fr.meqn);
        for m in 0..fr.meqn {
            fr.fine_plus[m * fr.n + cell] += weight * flux[m];
        }
    }


    /**
     * Record the coarse grid's own flux through a face cell, taken during
     * the coarse step. `weight` carries `dt_coarse * edge_length`.
     */
    pub fn store_coarse(&mut self, face: usize, cell: usize, flux: &[f64], weight: f64) {
        let fr = &mut self.faces[face];
        assert!(flux.len() == fr.meqn);
        for m in 0..fr.meqn {
            fr.coarse_front[m * fr.n + cell] += weight * flux[m];
        }
    }


    /**
     * Apply the coarse-fine conservation correction on one face: replace
     * the coarse flux contribution with the fine accumulation in the row of
     * interior cells adjacent to the face, then clear the face. This is the
     * sole operation sanctioned to mutate another patch's interior.
     */
    pub fn time_sync_f2c(&mut self, q: &mut GridData, face: usize) {
        let sign = face_sign(face);
        let (mx, my) = (self.mx, self.my);
        let fr = &mut self.faces[face];

        for cell in 0..fr.n {
            let index = boundary_cell(face, cell, mx, my);
            let area = fr.cell_area[cell];
            assert!(area > 0.0, "register setup must precede time_sync_f2c");
            for m in 0..fr.meqn {
                q.add(m, index, sign * fr.mismatch(m, cell) / area);
            }
        }
        fr.reset();
    }


    /**
     * Symmetric correction between two same-level patches across a block
     * boundary, where metric mismatch makes the two sides' fluxes disagree.
     * Each side moves halfway toward the neighbor's integrated flux, then
     * clears its face.
     */
    pub fn time_sync_samesize(&mut self, q: &mut GridData, face: usize, neighbor: &FaceRegister) {
        let sign = face_sign(face);
        let (mx, my) = (self.mx, self.my);
        let fr = &mut self.faces[face];
        assert!(neighbor.n == fr.n && neighbor.meqn == fr.meqn);

        for cell in 0..fr.n {
            let index = boundary_cell(face, cell, mx, my);
            let area = fr.cell_area[cell];
            assert!(area > 0.0, "register setup must precede time_sync_samesize");
            for m in 0..fr.meqn {
                let k = m * fr.n + cell;
                let mine = fr.coarse_front[k] + fr.coarse_back[k];
                let theirs = neighbor.coarse_front[k] + neighbor.coarse_back[k];
                q.add(m, index, 0.5 * sign * (theirs - mine) / area);
            }
        }
        fr.reset();
    }


    /**
     * Reset every face accumulator to zero. Applied at each time
     * synchronization point after corrections have been consumed.
     */
    pub fn reset(&mut self) {
        for fr in self.faces.iter_mut() {
            fr.reset();
        }
    }


    /**
     * Number of elements in the register payload:
     * `2 (4 meqn + 2)(mx + my)`. Fluxes are carried for every face even
     * though only one or two sides may be active.
     */
    pub fn elems(&self) -> usize {
        self.faces.iter().map(|fr| fr.elems()).sum()
    }


    /**
     * Serialize into (`Pack`) or deserialize from (`Unpack`) a flat
     * buffer, in face order, each face laid out as fine-plus, fine-minus,
     * coarse-front, coarse-back, edge-length, cell-area. Returns the number
     * of elements transferred, which the caller asserts against `elems`.
     */
    pub fn pack(&mut self, buffer: &mut [f64], mode: RegisterPackMode) -> usize {
        let mut at = 0;
        for fr in self.faces.iter_mut() {
            let arrays: [&mut Vec<f64>; 6] = [
                &mut fr.fine_plus,
                &mut fr.fine_minus,
                &mut fr.coarse_front,
                &mut fr.coarse_back,
                &mut fr.edge_length,
                &mut fr.cell_area,
            ];
            for array in arrays {
                let next = at + array.len();
                match mode {
                    RegisterPackMode::Pack => buffer[at..next].copy_from_slice(array),
                    RegisterPackMode::Unpack => array.copy_from_slice(&buffer[at..next]),
                }
                at = next;
            }
        }
        at
    }
}




/**
 * The interior cell adjacent to the given face, at the given position along
 * it.
 */
fn boundary_cell(face: usize, cell: usize, mx: i64, my: i64) -> Index {
    let c = cell as i64;
    match face {
        0 => (1, 1 + c, 0),
        1 => (mx, 1 + c, 0),
        2 => (1 + c, 1, 0),
        3 => (1 + c, my, 0),
        _ => panic!("invalid face number {}", face),
    }
}
