//! The encre binary file format.
//!
//! Layout (little-endian throughout):
//!
//! ```text
//! offset  size              field
//! 0       6                 magic "encre\0"
//! 6       1                 bits_per_color (u8)
//! 7       1                 rotation (u8 enum)
//! 8       2                 palette_size (u16)
//! 10      2                 width (u16)
//! 12      2                 height (u16)
//! 14      palette_size*12   palette points, (L, a, b) f32 triples
//! ...     ceil(w*h*bpc/8)   index stream, LSB-first within a byte
//! ```
//!
//! Bytes stream through a fixed 4 KiB buffer on both sides; the writer
//! never buffers more than that beyond the index raster itself.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::color::Oklab;
use crate::error::EncreError;
use crate::options::Rotation;

/// File magic, NUL included.
pub const ENCRE_MAGIC: [u8; 6] = *b"encre\0";

const IO_BUFFER_LEN: usize = 4096;
const HEADER_LIMIT: usize = u16::MAX as usize;

/// Bits needed per palette index: `floor(log2(palette_size)) + 1`.
pub fn bits_per_color(palette_size: usize) -> u8 {
    debug_assert!(palette_size > 0);
    (usize::BITS - palette_size.leading_zeros()) as u8
}

/// A decoded encre file.
#[derive(Debug, Clone, PartialEq)]
pub struct EncreFile {
    /// Palette indices in row-major order, one byte per pixel
    pub indices: Vec<u8>,
    /// Raster width in pixels
    pub width: u32,
    /// Raster height in pixels
    pub height: u32,
    /// Palette quantization targets, as written
    pub palette_points: Vec<Oklab>,
    /// Output orientation recorded by the converter
    pub rotation: Rotation,
}

struct Header {
    bits_per_color: u8,
    rotation: Rotation,
    palette_size: u16,
    width: u16,
    height: u16,
}

/// Serialize an index raster and its palette into an encre stream.
///
/// `indices.len()` must be a whole number of rows of `width`. Dimensions
/// and palette size must fit the u16 header fields.
pub fn write_encre(
    writer: &mut impl Write,
    indices: &[u8],
    width: u32,
    palette_points: &[Oklab],
    rotation: Rotation,
) -> Result<(), EncreError> {
    if width == 0 || indices.is_empty() {
        return Err(EncreError::InvalidInput(
            "image dimensions are zero".to_string(),
        ));
    }
    if indices.len() % width as usize != 0 {
        return Err(EncreError::InvalidInput(format!(
            "index buffer of {} entries is not a whole number of rows of width {}",
            indices.len(),
            width
        )));
    }
    let height = indices.len() / width as usize;

    if palette_points.is_empty() {
        return Err(EncreError::InvalidInput("palette is empty".to_string()));
    }
    for (what, value) in [
        ("palette size", palette_points.len()),
        ("width", width as usize),
        ("height", height),
    ] {
        if value > HEADER_LIMIT {
            return Err(EncreError::PaletteTooLarge {
                what,
                value,
                limit: HEADER_LIMIT,
            });
        }
    }

    let bits = bits_per_color(palette_points.len());

    writer.write_all(&ENCRE_MAGIC)?;
    writer.write_u8(bits)?;
    writer.write_u8(rotation.code())?;
    writer.write_u16::<LittleEndian>(palette_points.len() as u16)?;
    writer.write_u16::<LittleEndian>(width as u16)?;
    writer.write_u16::<LittleEndian>(height as u16)?;

    for point in palette_points {
        writer.write_f32::<LittleEndian>(point.l)?;
        writer.write_f32::<LittleEndian>(point.a)?;
        writer.write_f32::<LittleEndian>(point.b)?;
    }

    // LSB-first bit packing through the fixed buffer.
    let bits = bits as usize;
    let mask = (1u32 << bits) - 1;
    let mut buffer = [0u8; IO_BUFFER_LEN];
    let mut bit_index = 0usize;
    for &index in indices {
        let value = ((index as u32) & mask) << (bit_index & 7);
        let byte_index = bit_index >> 3;
        buffer[byte_index] |= value as u8;

        let mut next_byte_index = (bit_index + bits) >> 3;
        if byte_index != next_byte_index {
            if next_byte_index >= buffer.len() {
                writer.write_all(&buffer)?;
                buffer.fill(0);
                next_byte_index = 0;
            }
            buffer[next_byte_index] |= (value >> 8) as u8;
        }

        bit_index = (bit_index + bits) % (buffer.len() * 8);
    }
    if bit_index > 0 {
        writer.write_all(&buffer[..(bit_index + 7) / 8])?;
    }

    Ok(())
}

fn read_header(reader: &mut impl Read) -> Result<Header, EncreError> {
    let mut magic = [0u8; 6];
    read_exact_or_malformed(reader, &mut magic)?;
    if magic != ENCRE_MAGIC {
        return Err(EncreError::MalformedFile(
            "bad magic (not an encre file?)".to_string(),
        ));
    }

    let bits_per_color_field = read_u8_or_malformed(reader)?;
    let rotation_code = read_u8_or_malformed(reader)?;
    let palette_size = read_u16_or_malformed(reader)?;
    let width = read_u16_or_malformed(reader)?;
    let height = read_u16_or_malformed(reader)?;

    let rotation = Rotation::from_code(rotation_code).ok_or_else(|| {
        EncreError::MalformedFile(format!("unknown rotation code {rotation_code}"))
    })?;
    if palette_size == 0 || width == 0 || height == 0 {
        return Err(EncreError::MalformedFile(
            "zero palette size or dimensions".to_string(),
        ));
    }
    let expected_bits = bits_per_color(palette_size as usize);
    if bits_per_color_field != expected_bits {
        return Err(EncreError::MalformedFile(format!(
            "bits per color is {bits_per_color_field}, expected {expected_bits} for a \
             {palette_size}-color palette"
        )));
    }

    Ok(Header {
        bits_per_color: bits_per_color_field,
        rotation,
        palette_size,
        width,
        height,
    })
}

fn read_body(reader: &mut impl Read, header: &Header) -> Result<EncreFile, EncreError> {
    let mut palette_points = Vec::with_capacity(header.palette_size as usize);
    for _ in 0..header.palette_size {
        let l = read_f32_or_malformed(reader)?;
        let a = read_f32_or_malformed(reader)?;
        let b = read_f32_or_malformed(reader)?;
        palette_points.push(Oklab::new(l, a, b));
    }

    let pixel_count = header.width as usize * header.height as usize;
    let bits = header.bits_per_color as usize;
    let total_bytes = (pixel_count * bits + 7) / 8;

    let mut indices = vec![0u8; pixel_count];
    let mut buffer = [0u8; IO_BUFFER_LEN];
    let mut bytes_read = 0usize;

    let first_chunk = total_bytes.min(buffer.len());
    read_exact_or_malformed(reader, &mut buffer[..first_chunk])?;

    let mask = (1u32 << bits) - 1;
    let mut bit_index = 0usize;
    for slot in &mut indices {
        let byte_index = bit_index >> 3;
        let bit_offset = bit_index & 7;
        let mut value = ((buffer[byte_index] as u32) >> bit_offset) & mask;

        let mut next_byte_index = (bit_index + bits) >> 3;
        if byte_index != next_byte_index {
            if next_byte_index >= buffer.len() {
                bytes_read += buffer.len();
                let chunk = (total_bytes - bytes_read).min(buffer.len());
                read_exact_or_malformed(reader, &mut buffer[..chunk])?;
                next_byte_index = 0;
            }
            let next_bit_offset = 8 - bit_offset;
            let next_mask = (mask >> next_bit_offset) << next_bit_offset;
            value |= ((buffer[next_byte_index] as u32) << next_bit_offset) & next_mask;
        }

        *slot = value as u8;
        bit_index = (bit_index + bits) % (buffer.len() * 8);
    }

    // The layout fixes the total size exactly; anything after the index
    // stream is a malformed file.
    let mut trailing = [0u8; 1];
    match reader.read(&mut trailing) {
        Ok(0) => {}
        Ok(_) => {
            return Err(EncreError::MalformedFile(
                "trailing bytes after the index stream".to_string(),
            ))
        }
        Err(err) => return Err(EncreError::Io(err)),
    }

    Ok(EncreFile {
        indices,
        width: header.width as u32,
        height: header.height as u32,
        palette_points,
        rotation: header.rotation,
    })
}

/// Deserialize an encre stream.
pub fn read_encre(reader: &mut impl Read) -> Result<EncreFile, EncreError> {
    let header = read_header(reader)?;
    read_body(reader, &header)
}

/// Write an encre file to disk.
pub fn write_encre_file(
    path: impl AsRef<Path>,
    indices: &[u8],
    width: u32,
    palette_points: &[Oklab],
    rotation: Rotation,
) -> Result<(), EncreError> {
    let path = path.as_ref();
    let result = File::create(path)
        .map_err(EncreError::Io)
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            write_encre(&mut writer, indices, width, palette_points, rotation)?;
            writer.flush()?;
            Ok(())
        });
    if let Err(ref err) = result {
        tracing::error!(path = %path.display(), %err, "failed to write encre file");
    }
    result
}

/// Read an encre file from disk.
pub fn read_encre_file(path: impl AsRef<Path>) -> Result<EncreFile, EncreError> {
    let path = path.as_ref();
    let result = File::open(path)
        .map_err(EncreError::Io)
        .and_then(|file| read_encre(&mut BufReader::new(file)));
    if let Err(ref err) = result {
        tracing::error!(path = %path.display(), %err, "failed to read encre file");
    }
    result
}

/// Read an encre file, checking it against the geometry the caller expects.
///
/// Returns [`EncreError::IncompatibleFile`] when width, height or palette
/// size disagree with the expectation.
pub fn read_compatible_encre_file(
    path: impl AsRef<Path>,
    width: u32,
    height: u32,
    palette_size: usize,
) -> Result<EncreFile, EncreError> {
    let file = read_encre_file(path)?;
    if file.width != width || file.height != height {
        return Err(EncreError::IncompatibleFile(format!(
            "file is {}x{}, expected {}x{}",
            file.width, file.height, width, height
        )));
    }
    if file.palette_points.len() != palette_size {
        return Err(EncreError::IncompatibleFile(format!(
            "file palette has {} colors, expected {}",
            file.palette_points.len(),
            palette_size
        )));
    }
    Ok(file)
}

fn read_exact_or_malformed(reader: &mut impl Read, buffer: &mut [u8]) -> Result<(), EncreError> {
    reader.read_exact(buffer).map_err(map_read_error)
}

fn read_u8_or_malformed(reader: &mut impl Read) -> Result<u8, EncreError> {
    reader.read_u8().map_err(map_read_error)
}

fn read_u16_or_malformed(reader: &mut impl Read) -> Result<u16, EncreError> {
    reader.read_u16::<LittleEndian>().map_err(map_read_error)
}

fn read_f32_or_malformed(reader: &mut impl Read) -> Result<f32, EncreError> {
    reader.read_f32::<LittleEndian>().map_err(map_read_error)
}

fn map_read_error(err: io::Error) -> EncreError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        EncreError::MalformedFile("file is truncated".to_string())
    } else {
        EncreError::Io(err)
    }
}
