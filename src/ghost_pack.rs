use crate::config::{Config, Dim};
use crate::kernels::{ghost_shell_cells, KernelTable, PackDir};
use crate::metric::CoordinateMap;
use crate::patch::{patch_size, BuildMode, Brick, LogicalPatch, Patch};
use crate::registers::RegisterPackMode;
use log::debug;


/*
 * The parallel pack / unpack protocol. Remote ghost exchange serializes a
 * shell of each boundary patch into a flat buffer on the owning process and
 * reconstructs a read-only ghost patch on every process that borders it.
 * Partition packing, used when patches migrate between processes at
 * synchronized moments, serializes the whole solution grid with no hole.
 */




/**
 * Ghost payload mode, encoded as in the wire protocol: bit 0 is the
 * direction (0 pack, 1 unpack), bit 1 says whether per-cell areas /
 * volumes ride along.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackMode {
    Pack = 0,
    Unpack = 1,
    PackArea = 2,
    UnpackArea = 3,
}

impl PackMode {
    fn new(pack_area: bool, dir: PackDir) -> Self {
        match (pack_area, dir) {
            (false, PackDir::Pack) => PackMode::Pack,
            (false, PackDir::Unpack) => PackMode::Unpack,
            (true, PackDir::Pack) => PackMode::PackArea,
            (true, PackDir::Unpack) => PackMode::UnpackArea,
        }
    }

    fn dir(self) -> PackDir {
        if (self as i32) % 2 == 0 { PackDir::Pack } else { PackDir::Unpack }
    }

    fn packs_area(self) -> bool {
        (self as i32) / 2 == 1
    }
}




/**
 * Hook for solver-owned per-patch fields that ride along with the ghost
 * payload. The protocol hands the hook its reserved buffer segment; the
 * segment size is `ghost_patch_pack_numextrafields` values per shell cell.
 */
pub trait ExtraFieldsPacker {
    fn transfer(&mut self, patch: &mut Patch, buffer: &mut [f64], dir: PackDir);
}




/**
 * Whether this configuration sends areas / volumes with ghost payloads.
 * Only meaningful under manifold mode; a Cartesian run never packs them.
 */
pub fn pack_area(config: &Config) -> bool {
    config.ghost_patch_pack_area && config.manifold
}




/**
 * Allocation size of one remote ghost payload, in f64 elements: the grid
 * shell once per solution field, once more for areas when packed, the
 * extra-field segment, and the flux-register payload under time_sync.
 */
pub fn ghost_pack_elems(config: &Config) -> usize {
    let cells = ghost_shell_cells(config);
    let area = if pack_area(config) { 1 } else { 0 };
    let fields = config.meqn + area + config.ghost_patch_pack_numextrafields;

    let frsize = if config.time_sync {
        2 * (4 * config.meqn + 2) * (config.mx + config.my) as usize
    } else {
        0
    };
    cells * fields + frsize
}




/**
 * The packer and unpacker in one routine: transfers every payload segment
 * between the patch and `buffer` in wire order. The buffer size is
 * recomputed here and cross-checked against what the caller allocated;
 * a mismatch is an invariant violation, not a recoverable condition.
 *
 * Both directions go through the synchronized data source: a payload packed
 * from the time-interpolated grid at an intermediate level unpacks into the
 * ghost patch's time-interpolated grid, which is where every exchange
 * operation will read it.
 */
pub fn ghost_comm(
    config: &Config,
    table: &KernelTable,
    patch: &mut Patch,
    buffer: &mut [f64],
    time_interp: bool,
    mode: PackMode,
    extra: Option<&mut dyn ExtraFieldsPacker>,
) {
    let expected = {
        let area = if mode.packs_area() { 1 } else { 0 };
        let fields = config.meqn + area + config.ghost_patch_pack_numextrafields;
        let frsize = if config.time_sync {
            2 * (4 * config.meqn + 2) * (config.mx + config.my) as usize
        } else {
            0
        };
        ghost_shell_cells(config) * fields + frsize
    };
    assert!(
        buffer.len() == expected,
        "ghost payload size mismatch: allocated {}, packer needs {}",
        buffer.len(),
        expected
    );

    let dir = mode.dir();
    let cells = ghost_shell_cells(config);
    let mut at = 0;

    let qsize = cells * config.meqn;
    let q = patch.q_time_sync_mut(time_interp);
    let ierror = (table.local_ghost_pack)(config, q, &mut buffer[at..at + qsize], dir);
    if ierror != 0 {
        panic!("ghost shell transfer failed: ierror = {}", ierror);
    }
    at += qsize;

    if mode.packs_area() {
        let weights = patch
            .cell_weights_mut()
            .expect("area packing requires a manifold patch");
        let ierror = (table.local_ghost_pack)(config, weights, &mut buffer[at..at + cells], dir);
        if ierror != 0 {
            panic!("ghost area transfer failed: ierror = {}", ierror);
        }
        at += cells;
    }

    let nextra = config.ghost_patch_pack_numextrafields;
    if nextra > 0 {
        let packer = extra.expect("extra ghost fields configured but no packer supplied");
        packer.transfer(patch, &mut buffer[at..at + cells * nextra], dir);
        at += cells * nextra;
    }

    if config.time_sync {
        assert!(config.dim == Dim::Two, "flux registers are 2d only");
        let reg_mode = match dir {
            PackDir::Pack => RegisterPackMode::Pack,
            PackDir::Unpack => RegisterPackMode::Unpack,
        };
        let registers = patch.registers.as_mut().expect("time_sync patch has registers");
        let frsize = registers.elems();
        let n = registers.pack(&mut buffer[at..at + frsize], reg_mode);
        assert!(n == frsize);
        at += frsize;
    }

    debug!(
        "ghost payload {:?}: {} elements for patch {}/{}",
        mode, at, patch.blockno, patch.patchno
    );
    assert!(at == buffer.len());
}




/**
 * Pack one boundary patch for its remote neighbors.
 */
pub fn local_ghost_pack(
    config: &Config,
    table: &KernelTable,
    patch: &mut Patch,
    buffer: &mut [f64],
    time_interp: bool,
    extra: Option<&mut dyn ExtraFieldsPacker>,
) {
    let mode = PackMode::new(pack_area(config), PackDir::Pack);
    ghost_comm(config, table, patch, buffer, time_interp, mode, extra);
}


/**
 * Unpack a received payload into a ghost patch built by
 * `remote_ghost_build`.
 */
pub fn remote_ghost_unpack(
    config: &Config,
    table: &KernelTable,
    patch: &mut Patch,
    buffer: &mut [f64],
    time_interp: bool,
    extra: Option<&mut dyn ExtraFieldsPacker>,
) {
    let mode = PackMode::new(pack_area(config), PackDir::Unpack);
    ghost_comm(config, table, patch, buffer, time_interp, mode, extra);
}


/**
 * Build the local stand-in for a remote neighbor, ready for
 * `remote_ghost_unpack`. Step-retry buffers are skipped; the metric is
 * recomputed from the map except for the area plane when areas arrive in
 * the payload.
 */
pub fn remote_ghost_build(
    config: &Config,
    leaf: &LogicalPatch,
    brick: Option<&Brick>,
    map: Option<&dyn CoordinateMap>,
) -> Patch {
    let mode = BuildMode::ForGhost { packed_area: pack_area(config) };
    Patch::build(config, leaf, brick, map, mode)
}




// ============================================================================
// partition packing


/**
 * Size of one patch in a partition payload: the whole extended solution
 * grid, no hole. Partition transfer happens only at synchronized moments,
 * so no other buffer needs to travel.
 */
pub fn partition_packsize(config: &Config) -> usize {
    patch_size(config)
}


pub fn partition_pack(config: &Config, patch: &Patch, buffer: &mut [f64]) {
    assert!(buffer.len() == partition_packsize(config));
    patch.griddata.copy_to_slice(buffer);
}


pub fn partition_unpack(config: &Config, patch: &mut Patch, buffer: &[f64]) {
    assert!(buffer.len() == partition_packsize(config));
    patch.griddata.copy_from_slice(buffer);
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::config::Config;
    use crate::grid_data::GridData;
    use crate::kernels::KernelTable;
    use crate::patch::{BuildMode, LogicalPatch, Patch};

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

    fn scrambled(config: &Config) -> Patch {
        let mut patch = Patch::build(config, &unit_leaf(), None, None, BuildMode::ForUpdate);
        patch.griddata = GridData::from_function(config.grid_box(), config.meqn, |m, (i, j, _)| {
            (m as f64 + 1.0) * (37 * i + j) as f64
        });
        patch
    }

    #[test]
    fn payload_size_counts_every_segment() {
        let mut config = Config::basic2d(12, 12, 2, 2);
        // Shell: 16*16 - 4*4 = 240 cells.
        assert_eq!(ghost_pack_elems(&config), 240 * 2);

        config.manifold = true;
        config.ghost_patch_pack_area = true;
        assert_eq!(ghost_pack_elems(&config), 240 * 3);

        config.ghost_patch_pack_numextrafields = 2;
        assert_eq!(ghost_pack_elems(&config), 240 * 5);

        config.manifold = false;
        // Areas only travel under manifold mode.
        assert_eq!(ghost_pack_elems(&config), 240 * 4);

        let mut config = Config::basic2d(12, 12, 2, 2);
        config.time_sync = true;
        assert_eq!(ghost_pack_elems(&config), 240 * 2 + 2 * (4 * 2 + 2) * 24);
    }

    #[test]
    fn ghost_round_trip_is_bit_exact_on_the_shell() {
        let config = Config::basic2d(12, 12, 2, 2);
        let table = KernelTable::new(&config).unwrap();

        let mut source = scrambled(&config);
        let mut buffer = vec![0.0; ghost_pack_elems(&config)];
        local_ghost_pack(&config, &table, &mut source, &mut buffer, false, None);

        let mut ghost = remote_ghost_build(&config, &unit_leaf(), None, None);
        assert!(ghost.griddata_save.is_none());
        remote_ghost_unpack(&config, &table, &mut ghost, &mut buffer, false, None);

        // Everything outside the interior hole matches the source exactly.
        let mint = config.refratio * config.mbc;
        let hole = config.interior_box().trim_all(mint);
        for m in 0..config.meqn {
            for index in config.grid_box().iter() {
                if !hole.contains(index) {
                    assert_eq!(ghost.griddata.get(m, index), source.griddata.get(m, index));
                }
            }
        }
    }

    #[test]
    fn registers_travel_with_the_payload_under_time_sync() {
        let mut config = Config::basic2d(12, 12, 2, 1);
        config.time_sync = true;
        let table = KernelTable::new(&config).unwrap();

        let mut source = scrambled(&config);
        source
            .registers
            .as_mut()
            .unwrap()
            .accumulate_fine(0, 3, &[2.5], 1.0);

        let mut buffer = vec![0.0; ghost_pack_elems(&config)];
        local_ghost_pack(&config, &table, &mut source, &mut buffer, false, None);

        let mut ghost = remote_ghost_build(&config, &unit_leaf(), None, None);
        remote_ghost_unpack(&config, &table, &mut ghost, &mut buffer, false, None);

        let fr = &ghost.registers.as_ref().unwrap().faces[0];
        assert_eq!(fr.fine_plus[3], 2.5);
    }

    #[test]
    fn time_interp_payloads_land_in_the_time_interp_grid() {
        let mut config = Config::basic2d(12, 12, 2, 2);
        config.subcycle = true;
        let table = KernelTable::new(&config).unwrap();

        let mut source = scrambled(&config);
        source.griddata_time_interpolated = Some(GridData::from_function(
            config.grid_box(),
            config.meqn,
            |m, (i, j, _)| -(m as f64 + 1.0) * (101 + i + j) as f64,
        ));

        let mut buffer = vec![0.0; ghost_pack_elems(&config)];
        local_ghost_pack(&config, &table, &mut source, &mut buffer, true, None);

        let mut ghost = remote_ghost_build(&config, &unit_leaf(), None, None);
        remote_ghost_unpack(&config, &table, &mut ghost, &mut buffer, true, None);

        // The shell lands where the exchange operations read at an
        // intermediate level, and the current-solution grid stays clean.
        assert_eq!(ghost.q_time_sync(true).get(0, (0, 0, 0)), -101.0);
        assert_eq!(
            ghost.q_time_sync(true).get(1, (12, 5, 0)),
            source.q_time_sync(true).get(1, (12, 5, 0))
        );
        assert_eq!(ghost.griddata.get(0, (0, 0, 0)), 0.0);
    }

    #[test]
    fn time_sync_disabled_means_no_register_segment() {
        let config = Config::basic2d(12, 12, 2, 1);
        assert_eq!(ghost_pack_elems(&config), ghost_shell_cells(&config));
    }

    #[test]
    #[should_panic(expected = "size mismatch")]
    fn undersized_payloads_are_rejected() {
        let config = Config::basic2d(12, 12, 2, 1);
        let table = KernelTable::new(&config).unwrap();
        let mut patch = scrambled(&config);
        let mut buffer = vec![0.0; ghost_pack_elems(&config) - 1];
        local_ghost_pack(&config, &table, &mut patch, &mut buffer, false, None);
    }

    #[test]
    fn extra_fields_ride_in_their_own_segment() {
        struct Marker;
        impl ExtraFieldsPacker for Marker {
            fn transfer(&mut self, _patch: &mut Patch, buffer: &mut [f64], dir: PackDir) {
                if dir == PackDir::Pack {
                    for x in buffer.iter_mut() {
                        *x = 7.0;
                    }
                } else {
                    assert!(buffer.iter().all(|x| *x == 7.0));
                }
            }
        }

        let mut config = Config::basic2d(12, 12, 2, 1);
        config.ghost_patch_pack_numextrafields = 1;
        let table = KernelTable::new(&config).unwrap();

        let mut source = scrambled(&config);
        let mut buffer = vec![0.0; ghost_pack_elems(&config)];
        local_ghost_pack(&config, &table, &mut source, &mut buffer, false, Some(&mut Marker));

        let mut ghost = remote_ghost_build(&config, &unit_leaf(), None, None);
        remote_ghost_unpack(&config, &table, &mut ghost, &mut buffer, false, Some(&mut Marker));
    }

    #[test]
    fn partition_round_trip_reproduces_the_whole_grid() {
        let config = Config::basic2d(8, 8, 2, 3);
        let source = scrambled(&config);

        let mut buffer = vec![0.0; partition_packsize(&config)];
        partition_pack(&config, &source, &mut buffer);

        let mut landed = Patch::build(&config, &unit_leaf(), None, None, BuildMode::ForUpdate);
        partition_unpack(&config, &mut landed, &buffer);
        assert_eq!(landed.griddata, source.griddata);
    }
}
