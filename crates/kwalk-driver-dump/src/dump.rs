use std::{fs::File, path::Path, rc::Rc};

use elf::{ElfBytes, abi::PT_LOAD, endian::AnyEndian};
use kwalk_core::{MappedPage, Pa};
use memmap2::Mmap;

use crate::Error;

const ELF_MAGIC: &[u8] = b"\x7fELF";

/// The on-disk layout of a dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFormat {
    /// A flat image; file offset equals physical address.
    Raw,

    /// An ELF core whose `PT_LOAD` segments are placed by `p_paddr`.
    Elf,
}

/// A contiguous run of physical memory stored in the file.
#[derive(Debug, Clone, Copy)]
struct Region {
    start: u64,
    len: u64,
    file_offset: u64,
}

impl Region {
    fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// A memory-mapped physical memory dump.
pub struct Dump {
    mmap: Rc<Mmap>,
    format: DumpFormat,
    regions: Vec<Region>,
}

impl Dump {
    /// Opens and maps a dump file, detecting its format.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;

        // SAFETY: The mapping is read-only. Concurrent truncation of the file
        // by another process is outside of our control, as with any mmap.
        let mmap = unsafe { Mmap::map(&file)? };

        let (format, regions) = match mmap.starts_with(ELF_MAGIC) {
            true => (DumpFormat::Elf, elf_regions(&mmap)?),
            false => (
                DumpFormat::Raw,
                vec![Region {
                    start: 0,
                    len: mmap.len() as u64,
                    file_offset: 0,
                }],
            ),
        };

        tracing::debug!(
            path = %path.display(),
            ?format,
            size = mmap.len(),
            regions = regions.len(),
            "opened memory dump"
        );

        Ok(Self {
            mmap: Rc::new(mmap),
            format,
            regions,
        })
    }

    /// Returns the detected format.
    pub fn format(&self) -> DumpFormat {
        self.format
    }

    /// Returns the end of the highest backed physical address range.
    pub fn end(&self) -> Pa {
        Pa(self.regions.iter().map(Region::end).max().unwrap_or(0))
    }

    /// Maps up to `len` bytes at `pa`, stopping at the end of the region
    /// that contains `pa`.
    pub fn map(&self, pa: Pa, len: u64) -> Result<MappedPage, Error> {
        let region = self
            .regions
            .iter()
            .find(|region| region.start <= pa.0 && pa.0 < region.end())
            .ok_or(Error::OutOfBounds(pa))?;

        let offset = region.file_offset + (pa.0 - region.start);
        let len = len.min(region.end() - pa.0);
        let backing: Rc<dyn AsRef<[u8]>> = self.mmap.clone();

        MappedPage::from_shared(backing, offset as usize, len as usize).ok_or(Error::OutOfBounds(pa))
    }
}

fn elf_regions(data: &[u8]) -> Result<Vec<Region>, Error> {
    let elf = ElfBytes::<AnyEndian>::minimal_parse(data)?;
    let segments = elf.segments().ok_or(Error::NoLoadSegments)?;

    let mut regions = Vec::new();
    for phdr in segments.iter().filter(|phdr| phdr.p_type == PT_LOAD) {
        if phdr.p_filesz == 0 {
            continue;
        }

        let in_file = phdr
            .p_offset
            .checked_add(phdr.p_filesz)
            .is_some_and(|end| end <= data.len() as u64);

        if !in_file {
            return Err(Error::TruncatedSegment {
                paddr: Pa(phdr.p_paddr),
            });
        }

        if phdr.p_paddr.checked_add(phdr.p_filesz).is_none() {
            return Err(Error::SegmentOverflow {
                paddr: Pa(phdr.p_paddr),
            });
        }

        tracing::trace!(
            paddr = %Pa(phdr.p_paddr),
            offset = phdr.p_offset,
            size = phdr.p_filesz,
            "PT_LOAD segment"
        );

        regions.push(Region {
            start: phdr.p_paddr,
            len: phdr.p_filesz,
            file_offset: phdr.p_offset,
        });
    }

    if regions.is_empty() {
        return Err(Error::NoLoadSegments);
    }

    regions.sort_by_key(|region| region.start);
    Ok(regions)
}
