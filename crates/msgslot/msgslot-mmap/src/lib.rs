use memmap2::MmapMut;
use std::{
    fs::{File, OpenOptions},
    io,
    path::Path,
};

/// A read-write shared mapping of a whole file.
///
/// Several processes may map the same file at once; every mapping sees the
/// others' stores. Synchronizing access is the caller's job.
pub struct SharedMapping {
    _file: File,
    mmap: MmapMut,
}

impl SharedMapping {
    /// Map `path` read-write, creating it and sizing it to `size_bytes` when
    /// it is missing or empty. Fresh bytes read as zero.
    ///
    /// An existing file is never truncated. If it is non-empty and not
    /// exactly `size_bytes` long the call fails with `InvalidData`, since
    /// it was laid out by someone with a different geometry.
    pub fn open_or_create<P: AsRef<Path>>(path: P, size_bytes: u64) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let current = file.metadata()?.len();
        if current == 0 {
            // Two processes racing here both extend to the same length,
            // which leaves the contents zeroed either way.
            file.set_len(size_bytes)?;
        } else if current != size_bytes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("mapped file is {current} bytes, expected {size_bytes}"),
            ));
        }

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Return raw pointer to start of memory mapped file data
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_path(name: &str) -> String {
        format!("/tmp/msgslot_mmap_{}_{name}", std::process::id())
    }

    #[test]
    fn new_file_is_sized_and_zeroed() {
        let path = test_path("fresh");
        let _ = std::fs::remove_file(&path);

        let map = SharedMapping::open_or_create(&path, 4096).unwrap();
        assert_eq!(map.len(), 4096);
        let bytes = unsafe { std::slice::from_raw_parts(map.as_ptr(), map.len()) };
        assert!(bytes.iter().all(|&b| b == 0));

        drop(map);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn second_mapping_sees_first_mappings_stores() {
        let path = test_path("shared");
        let _ = std::fs::remove_file(&path);

        let mut a = SharedMapping::open_or_create(&path, 64).unwrap();
        let b = SharedMapping::open_or_create(&path, 64).unwrap();
        unsafe { a.as_mut_ptr().add(7).write(0x5A) };
        assert_eq!(unsafe { b.as_ptr().add(7).read_volatile() }, 0x5A);

        drop((a, b));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn size_mismatch_is_refused() {
        let path = test_path("mismatch");
        let _ = std::fs::remove_file(&path);

        let first = SharedMapping::open_or_create(&path, 128).unwrap();
        let err = SharedMapping::open_or_create(&path, 256).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        drop(first);
        let _ = std::fs::remove_file(&path);
    }
}
