//! Reference SPH kernels for the sphve step pipeline.
//!
//! Every kernel is a function over an owned particle range `[first, last)`
//! of a [`ParticleData`](sphve_fields::ParticleData) and the simulation
//! box. Kernels borrow exactly the columns they touch, so a kernel run
//! against a released column fails with
//! [`FieldError::NotAllocated`](sphve_core::FieldError::NotAllocated)
//! instead of reading stale memory.
//!
//! # Pipeline order (each step)
//!
//! 1. [`find_neighbors`]: positions, `h` → neighbor lists, `nc`
//! 2. [`xmass`]: → `xm`
//! 3. [`ve_def_gradh`]: `xm` → `kx`, `gradh`
//! 4. [`compute_eos`]: `temp`, `kx`, `xm`, `gradh` → `prho`, `c`
//! 5. [`iad_divv_curlv`]: → `c11..c33`, `divv`, `curlv`
//! 6. [`av_switches`]: → `alpha`, optionally `dV11..dV33`
//! 7. [`momentum_energy`]: → `ax, ay, az`, `du`
//! 8. [`compute_timestep`], optionally [`drive_turbulence`]
//! 9. [`compute_positions`], [`update_smoothing_length`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod av;
pub mod eos;
pub mod iad;
pub mod kernel;
pub mod momentum;
pub mod positions;
pub mod search;
pub mod timestep;
pub mod turbulence;
pub mod ve;

pub use av::{alpha_target, av_switches, DV_FIELDS};
pub use eos::{compute_eos, ideal_gas, ideal_gas_cv};
pub use iad::iad_divv_curlv;
pub use momentum::momentum_energy;
pub use positions::{compute_positions, update_smoothing_length};
pub use search::find_neighbors;
pub use timestep::{compute_timestep, local_timestep};
pub use turbulence::{
    drive_turbulence, TurbulenceConstants, TurbulenceData, TurbulenceError, TurbulenceState,
};
pub use ve::{ve_def_gradh, xmass};
