use log::info;
use quadrille::config::Config;
use quadrille::exchange;
use quadrille::grid_data::GridData;
use quadrille::kernels::KernelTable;
use quadrille::patch::{BuildMode, Brick, LogicalPatch, Patch};
use quadrille::sync::SyncPass;
use quadrille::tagging;


/*
 * A minimal driver exercising the patch layer: a periodic row of patches
 * advecting a Gaussian pulse in x with a first-order upwind update, ghost
 * cells refreshed from the neighbors every step, followed by a refine /
 * coarsen round trip through the sibling transfers.
 */




fn leaf(patchno: usize, level: u32) -> LogicalPatch {
    LogicalPatch {
        blockno: patchno,
        patchno,
        level,
        xlower: 0.0,
        ylower: 0.0,
        zlower: 0.0,
        xupper: 1.0,
        yupper: 1.0,
        zupper: 1.0,
    }
}


fn build_row(config: &Config, count: usize) -> Vec<Patch> {
    let brick = Brick { shape: (count as i64, 1, 1) };

    (0..count)
        .map(|n| {
            let mut patch =
                Patch::build(config, &leaf(n, 0), Some(&brick), None, BuildMode::ForUpdate);
            let (dx, _, _) = patch.spacing();
            let (xlower, _, _) = patch.lower();
            patch.griddata = GridData::from_function(config.grid_box(), 1, |_, (i, _, _)| {
                let x = xlower + (i as f64 - 0.5) * dx;
                (-(x - 0.5) * (x - 0.5) / 0.005).exp()
            });
            patch
        })
        .collect()
}


/**
 * One upwind step with unit advection speed in x.
 */
fn advance(config: &Config, patch: &mut Patch, cfl: f64) {
    patch.save_current_step();
    let q = patch.griddata.clone();
    for index in config.interior_box().iter() {
        let du = q.get(0, index) - q.get(0, (index.0 - 1, index.1, index.2));
        patch.griddata.add(0, index, -cfl * du);
    }
}


fn total_mass(config: &Config, patches: &[Patch]) -> f64 {
    patches
        .iter()
        .map(|patch| {
            let (dx, dy, _) = patch.spacing();
            let sum: f64 = config
                .interior_box()
                .iter()
                .map(|index| patch.griddata.get(0, index))
                .sum();
            sum * dx * dy
        })
        .sum()
}




// ============================================================================
fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .unwrap();

    let config = Config::basic2d(16, 16, 2, 1);
    config.validate().unwrap();
    let table = KernelTable::new(&config).unwrap();

    let mut patches = build_row(&config, 4);
    let pass = SyncPass::periodic_row(&config, 4);
    let mass0 = total_mass(&config, &patches);
    info!("initial mass {:.12}", mass0);

    let cfl = 0.5;
    for step in 1..=64_u64 {
        pass.sync(&config, &table, false, &mut patches);
        for patch in patches.iter_mut() {
            advance(&config, patch, cfl);
        }
        if step % 16 == 0 {
            let mass = total_mass(&config, &patches);
            info!("[{}] mass {:.12} drift {:+.3e}", step, mass, mass - mass0);
        }
    }

    // Refine the first patch into its four siblings and average back: the
    // round trip preserves the patch mean for the limited interpolant.
    if tagging::tag4refinement(&config, &table, &patches[0]) {
        let mut siblings: Vec<Patch> = (0..4)
            .map(|n| Patch::build(&config, &leaf(n, 1), None, None, BuildMode::ForUpdate))
            .collect();
        exchange::interpolate2fine(&config, &table, &patches[0], &mut siblings);

        let mut parent = Patch::build(&config, &leaf(0, 0), None, None, BuildMode::ForUpdate);
        exchange::average2coarse(&config, &table, &mut parent, &siblings);

        let before: f64 = config
            .interior_box()
            .iter()
            .map(|i| patches[0].griddata.get(0, i))
            .sum();
        let after: f64 = config
            .interior_box()
            .iter()
            .map(|i| parent.griddata.get(0, i))
            .sum();
        info!("refine / coarsen round trip: {:.12} -> {:.12}", before, after);
    }
}
