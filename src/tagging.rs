use crate::config::Config;
use crate::kernels::KernelTable;
use crate::patch::Patch;




/**
 * Whether a patch should be refined. A negative refine threshold means
 * refinement is unconditional (useful for forcing uniform refinement up to
 * the minimum level); otherwise the kernel table's criterion scans the
 * interior.
 */
pub fn tag4refinement(config: &Config, table: &KernelTable, patch: &Patch) -> bool {
    if config.refine_threshold < 0.0 {
        return true;
    }
    (table.exceeds_threshold)(config, &patch.griddata, config.refine_threshold)
}




/**
 * Whether a family of siblings should be replaced by their parent. A
 * coarsen threshold at or below zero disables coarsening entirely, as a
 * silent deterministic no-op rather than an error. Otherwise the family
 * coarsens only when no sibling still exceeds the threshold.
 */
pub fn tag4coarsening(config: &Config, table: &KernelTable, siblings: &[Patch]) -> bool {
    assert!(siblings.len() == config.dim.num_siblings());
    if config.coarsen_threshold <= 0.0 {
        return false;
    }
    siblings
        .iter()
        .all(|patch| !(table.exceeds_threshold)(config, &patch.griddata, config.coarsen_threshold))
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{tag4coarsening, tag4refinement};
    use crate::config::Config;
    use crate::kernels::KernelTable;
    use crate::patch::{BuildMode, LogicalPatch, Patch};

    fn built(config: &Config, fill: f64) -> Patch {
        let leaf = LogicalPatch {
            blockno: 0,
            patchno: 0,
            level: 0,
            xlower: 0.0,
            ylower: 0.0,
            zlower: 0.0,
            xupper: 1.0,
            yupper: 1.0,
            zupper: 1.0,
        };
        let mut patch = Patch::build(config, &leaf, None, None, BuildMode::ForUpdate);
        patch.griddata.set(0, (4, 4, 0), fill);
        patch
    }

    #[test]
    fn negative_threshold_always_refines() {
        let config = Config::basic2d(8, 8, 2, 1);
        assert!(config.refine_threshold < 0.0);
        let table = KernelTable::new(&config).unwrap();
        assert!(tag4refinement(&config, &table, &built(&config, 0.0)));
    }

    #[test]
    fn refinement_follows_the_criterion() {
        let mut config = Config::basic2d(8, 8, 2, 1);
        config.refine_threshold = 1.0;
        let table = KernelTable::new(&config).unwrap();
        assert!(!tag4refinement(&config, &table, &built(&config, 0.5)));
        assert!(tag4refinement(&config, &table, &built(&config, 1.5)));
    }

    #[test]
    fn coarsening_disabled_below_zero_is_silent() {
        let config = Config::basic2d(8, 8, 2, 1);
        assert!(config.coarsen_threshold <= 0.0);
        let table = KernelTable::new(&config).unwrap();
        let family: Vec<Patch> = (0..4).map(|_| built(&config, 0.0)).collect();
        assert!(!tag4coarsening(&config, &table, &family));
    }

    #[test]
    fn one_loud_sibling_blocks_coarsening() {
        let mut config = Config::basic2d(8, 8, 2, 1);
        config.coarsen_threshold = 1.0;
        let table = KernelTable::new(&config).unwrap();

        let quiet: Vec<Patch> = (0..4).map(|_| built(&config, 0.5)).collect();
        assert!(tag4coarsening(&config, &table, &quiet));

        let mut mixed: Vec<Patch> = (0..4).map(|_| built(&config, 0.5)).collect();
        mixed[2].griddata.set(0, (2, 2, 0), 3.0);
        assert!(!tag4coarsening(&config, &table, &mixed));
    }
}
