//! Save-file header framing and the descriptor-interning table used to serialize registry
//! references (block/biome/entity names) compactly: a referenced descriptor's name is written out
//! in full only the first time it appears in a stream, after which later references are a bare
//! numeric index into that stream's interning table.

use std::io::{Read, Write};

use hashbrown::HashMap;

use super::{ByteStreamReader, ByteStreamWriter, CodecError, CodecResult};

/// Magic bytes at the start of every save file, matching the original engine's file format tag.
pub const FILE_MAGIC: &[u8; 8] = b"Voxels  ";
/// The only file format version this build writes and understands.
pub const CURRENT_VERSION: u32 = 1;

/// The fixed-size header at the start of a save file or a full-state network dump.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct FileHeader {
    /// Format version, checked against [`CURRENT_VERSION`] on read.
    pub version: u32,
}

impl FileHeader {
    /// The header this build writes.
    pub const CURRENT: Self = Self {
        version: CURRENT_VERSION,
    };

    /// Writes the magic bytes and version.
    pub fn write(&self, w: &mut impl Write) -> CodecResult<()> {
        w.write_all(FILE_MAGIC)?;
        w.write_u32(self.version)?;
        Ok(())
    }

    /// Reads and validates the magic bytes, then reads the version without validating it against
    /// [`CURRENT_VERSION`] (callers decide whether to accept older/newer versions).
    pub fn read(r: &mut impl Read) -> CodecResult<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != FILE_MAGIC {
            return Err(CodecError::BadMagic);
        }
        let version = r.read_u32()?;
        Ok(Self { version })
    }

    /// Reads and validates both the magic and that the version is exactly [`CURRENT_VERSION`].
    pub fn read_current(r: &mut impl Read) -> CodecResult<Self> {
        let header = Self::read(r)?;
        if header.version != CURRENT_VERSION {
            return Err(CodecError::UnsupportedVersion(header.version));
        }
        Ok(header)
    }
}

/// Interns descriptor names on write: the first time a given name is written, its index and full
/// name are both emitted; every subsequent write of the same name only emits the index.
#[derive(Default)]
pub struct DescriptorWriter {
    next_index: u32,
    known: HashMap<String, u32>,
}

impl DescriptorWriter {
    /// Constructs an empty interning table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a reference to `name`, interning it if this is the first time it's seen.
    pub fn write_ref(&mut self, w: &mut impl Write, name: &str) -> CodecResult<()> {
        if let Some(&idx) = self.known.get(name) {
            w.write_u32(idx)?;
            w.write_bool(false)?;
        } else {
            let idx = self.next_index;
            self.next_index = self
                .next_index
                .checked_add(1)
                .expect("more descriptor references than fit in a u32 in a single stream");
            self.known.insert(name.to_owned(), idx);
            w.write_u32(idx)?;
            w.write_bool(true)?;
            w.write_string(name)?;
        }
        Ok(())
    }
}

/// The read-side counterpart of [`DescriptorWriter`].
#[derive(Default)]
pub struct DescriptorReader {
    names: Vec<String>,
}

impl DescriptorReader {
    /// Constructs an empty interning table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a descriptor reference, resolving it to a name either freshly read from the stream
    /// or looked up by index in the table built up so far.
    pub fn read_ref(&mut self, r: &mut impl Read) -> CodecResult<&str> {
        let idx = r.read_u32()?;
        let has_name = r.read_bool()?;
        if has_name {
            if idx as usize != self.names.len() {
                return Err(CodecError::MalformedString(
                    "descriptor interned out of order: first occurrence must use the next index",
                ));
            }
            let name = r.read_string()?;
            self.names.push(name);
        } else if idx as usize >= self.names.len() {
            return Err(CodecError::MalformedString(
                "descriptor index references a name not yet interned",
            ));
        }
        Ok(&self.names[idx as usize])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let mut buf = Vec::new();
        FileHeader::CURRENT.write(&mut buf).unwrap();
        let header = FileHeader::read_current(&mut &buf[..]).unwrap();
        assert_eq!(header, FileHeader::CURRENT);
    }

    #[test]
    fn bad_magic_rejected() {
        let buf = [0u8; 12];
        assert!(matches!(FileHeader::read(&mut &buf[..]), Err(CodecError::BadMagic)));
    }

    #[test]
    fn descriptor_table_interns_by_first_occurrence() {
        let mut writer = DescriptorWriter::new();
        let mut buf = Vec::new();
        writer.write_ref(&mut buf, "core:stone").unwrap();
        writer.write_ref(&mut buf, "core:dirt").unwrap();
        writer.write_ref(&mut buf, "core:stone").unwrap();

        let mut cursor = &buf[..];
        let mut reader = DescriptorReader::new();
        assert_eq!(reader.read_ref(&mut cursor).unwrap(), "core:stone");
        assert_eq!(reader.read_ref(&mut cursor).unwrap(), "core:dirt");
        assert_eq!(reader.read_ref(&mut cursor).unwrap(), "core:stone");
    }
}
