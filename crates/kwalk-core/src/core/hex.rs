use std::fmt;

/// Formats an integer as zero-padded hexadecimal, two digits per byte of its
/// type.
///
/// # Examples
///
/// ```
/// # use kwalk_core::Hex;
/// assert_eq!(Hex(42u16).to_string(), "0x002a");
/// assert_eq!(Hex(0x811c_5e20u64).to_string(), "0x00000000811c5e20");
/// ```
#[derive(Clone, Copy)]
pub struct Hex<T>(pub T);

impl<T> fmt::Display for Hex<T>
where
    T: Copy + fmt::LowerHex,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let width = size_of::<T>() * 2 + 2;
        write!(f, "{:#0width$x}", self.0)
    }
}

impl<T> fmt::Debug for Hex<T>
where
    T: Copy + fmt::LowerHex,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
