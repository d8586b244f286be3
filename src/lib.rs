//! Quadrille is the patch-data layer for a hyperbolic PDE solver running on
//! a dynamically adapted quadtree / octree mesh distributed across many
//! processes. It owns the numerical state living on each leaf of the mesh
//! hierarchy, synchronizes that state across patch boundaries (same-level,
//! coarse-fine, and multi-block interfaces), keeps AMR coarsening and
//! refinement transfers conservative, and packs patch state into flat
//! buffers for inter-process ghost exchange and dynamic repartitioning. The
//! mesh-topology engine (which tracks the forest of octrees and computes
//! neighbor relationships) and the flux / Riemann kernels are external
//! collaborators: this crate consumes neighbor queries and transform
//! descriptors and invokes numerical kernels through an indirection table
//! selected once at setup.

pub mod comm;
pub mod config;
pub mod error;
pub mod exchange;
pub mod ghost_pack;
pub mod grid_data;
pub mod index_box;
pub mod kernels;
pub mod metric;
pub mod patch;
pub mod registers;
pub mod sync;
pub mod tagging;
pub mod transform;
