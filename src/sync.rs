use log::debug;
use rayon::prelude::*;

use crate::config::Config;
use crate::exchange::{self, face_ghost_region};
use crate::grid_data::GridData;
use crate::index_box::IndexBox;
use crate::kernels::KernelTable;
use crate::patch::Patch;
use crate::transform::Transform;


/*
 * The intra-process synchronization pass. A pass walks a set of same-level
 * patches joined by directed face links, extracts the source cells each
 * link's target ghost strip reads, and then lands every extracted strip in
 * its target. Nothing is written until every read is done, so the links of
 * a pass may land in any order, and the apply phase can fan out across the
 * Rayon pool with each worker owning its target patch outright while it
 * writes.
 */




/// A directed face adjacency between two same-level patches of the pass:
/// the ghost strip on face `iface` of `target` reads `source` through
/// `transform`.
pub struct FaceLink {
    pub source: usize,
    pub target: usize,
    pub iface: usize,
    pub transform: Transform,
}


/// One extracted boundary strip, addressed to a target ghost region.
struct Strip {
    region: IndexBox,
    transform: Transform,
    data: GridData,
}




/**
 * The face links of one synchronization pass over a set of same-level
 * patches indexed `0..count`. The mesh-topology layer assembles the links
 * once per regrid; the pass itself is then run every time the ghost cells
 * go stale.
 */
pub struct SyncPass {
    count: usize,
    links: Vec<FaceLink>,
}


// ============================================================================
impl SyncPass {


    pub fn new(count: usize) -> Self {
        Self { count, links: Vec::new() }
    }


    pub fn link(&mut self, link: FaceLink) {
        assert!(link.source < self.count && link.target < self.count);
        self.links.push(link);
    }


    /**
     * The links of a periodic row of patches along x: each patch reads its
     * x-lower neighbor through face 0 and its x-upper neighbor through face
     * 1, the wrap expressed as a shift by the patch extent.
     */
    pub fn periodic_row(config: &Config, count: usize) -> Self {
        let mut pass = Self::new(count);
        for n in 0..count {
            let left = (n + count - 1) % count;
            let right = (n + 1) % count;
            pass.link(FaceLink {
                source: left,
                target: n,
                iface: 0,
                transform: Transform::shift(0, [config.mx, 0, 0]),
            });
            pass.link(FaceLink {
                source: right,
                target: n,
                iface: 1,
                transform: Transform::shift(0, [-config.mx, 0, 0]),
            });
        }
        pass
    }


    /**
     * Run the pass in serial. A no-op at an intermediate time level when
     * the time-interpolated fill is disabled.
     */
    pub fn sync(
        &self,
        config: &Config,
        table: &KernelTable,
        time_interp: bool,
        patches: &mut [Patch],
    ) {
        if !exchange::fill_ghost(config, time_interp) {
            return;
        }
        assert!(patches.len() == self.count);

        let inbox = self.extract(config, time_interp, patches);
        for (patch, strips) in patches.iter_mut().zip(inbox) {
            apply(table, patch, time_interp, strips);
        }
        debug!("synchronized {} patches over {} links", self.count, self.links.len());
    }


    /**
     * Run the pass on the Rayon pool. Strips are extracted up front; each
     * patch's ghost fill then runs on whichever worker picks it up.
     */
    pub fn sync_par(
        &self,
        config: &Config,
        table: &KernelTable,
        time_interp: bool,
        patches: &mut [Patch],
    ) {
        if !exchange::fill_ghost(config, time_interp) {
            return;
        }
        assert!(patches.len() == self.count);

        let inbox = self.extract(config, time_interp, patches);
        patches
            .par_iter_mut()
            .zip(inbox)
            .for_each(|(patch, strips)| apply(table, patch, time_interp, strips));
    }


    /**
     * Extract phase: clone out, per link, exactly the source cells the
     * target ghost strip maps onto, grouped by target.
     */
    fn extract(&self, config: &Config, time_interp: bool, patches: &[Patch]) -> Vec<Vec<Strip>> {
        let mut inbox: Vec<Vec<Strip>> = (0..patches.len()).map(|_| Vec::new()).collect();
        for link in &self.links {
            let region = face_ghost_region(config, link.iface);
            let window = mapped_box(&region, &link.transform);
            let source = patches[link.source].q_time_sync(time_interp);
            let data = GridData::from_function(window, source.num_fields(), |m, index| {
                source.get(m, index)
            });
            inbox[link.target].push(Strip { region, transform: link.transform, data });
        }
        inbox
    }
}


fn apply(table: &KernelTable, patch: &mut Patch, time_interp: bool, strips: Vec<Strip>) {
    for strip in strips {
        (table.copy_face)(
            patch.q_time_sync_mut(time_interp),
            &strip.data,
            &strip.region,
            &strip.transform,
        );
    }
}


/**
 * The axis-aligned source-frame box a target region reads through a
 * transform: the images of the two extreme corners, sorted per axis.
 */
fn mapped_box(region: &IndexBox, tr: &Transform) -> IndexBox {
    let (ei, ej, ek) = region.end();
    let a = tr.map(region.start());
    let b = tr.map((ei - 1, ej - 1, ek - 1));
    let lo = (a.0.min(b.0), a.1.min(b.1), a.2.min(b.2));
    let hi = (a.0.max(b.0), a.1.max(b.1), a.2.max(b.2));
    if region.rank() == 2 {
        IndexBox::new2(lo.0..hi.0 + 1, lo.1..hi.1 + 1)
    } else {
        IndexBox::new3(lo.0..hi.0 + 1, lo.1..hi.1 + 1, lo.2..hi.2 + 1)
    }
}
