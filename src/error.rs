use std::error;
use std::fmt;

#[derive(Debug)]

/**
 * Error to represent a configuration the core cannot honor. Configuration
 * errors are reported at setup time and are not recoverable: they reflect a
 * capability gap, not a runtime data condition. Invariant violations
 * (pack-size mismatches, negative hole sizes reaching the packer, null
 * required buffers) fail fast through assertions instead, and nonzero error
 * codes reported by numerical kernels are fatal at the call site.
 */
pub enum Error {
    /// The dimension / kernel-version combination is not implemented.
    UnsupportedKernelVersion(u32, u32),
    /// Conservation registers are not implemented in 3d.
    UnsupportedTimeSync(u32),
    /// The interior hole in the ghost packing would have negative extent for
    /// this combination of patch size, ghost width, and refinement ratio.
    NegativePackingHole(i64, i64),
    /// An option value is outside its valid range.
    InvalidOption(&'static str, String),
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        use Error::*;

        match self {
            UnsupportedKernelVersion(dim, version) => write!(
                fmt,
                "kernel version {} is not implemented in {}d",
                version, dim
            ),
            UnsupportedTimeSync(dim) => write!(
                fmt,
                "conservation fix not yet implemented in {}d",
                dim
            ),
            NegativePackingHole(nx, mint) => write!(
                fmt,
                "ghost packing hole has negative extent: patch size {} < 2 x {}",
                nx, mint
            ),
            InvalidOption(name, why) => write!(fmt, "invalid option {}: {}", name, why),
        }
    }
}

impl error::Error for Error {}




// ============================================================================
#[cfg(test)]
mod test {

    use super::Error;

    #[test]
    fn display_renders_a_single_line() {
        let message = Error::InvalidOption("mbc", "must be positive".into()).to_string();
        assert_eq!(message, "invalid option mbc: must be positive");
        assert!(!message.ends_with('\n'));
    }
}
