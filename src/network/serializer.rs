use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

use crate::math::scalar::Float;
use crate::math::wire;
use crate::network::network::Network;

/// "MNST" as a 32-bit value; the first field of every model file.
pub const MODEL_MAGIC: u32 = 0x4D4E_5354;

/// Frames a network's payload into a model file and reconstructs it.
///
/// File layout, no padding: `[magic: u32][network payload]`. The magic check
/// means a foreign or corrupt file is reported as `InvalidData` instead of
/// being misread; missing files and truncation come back as ordinary
/// `io::Error`s. None of the load path panics.
pub struct ModelSerializer;

impl ModelSerializer {
    pub fn save<F: Float>(network: &Network<F>, path: impl AsRef<Path>) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        wire::write_u32(&mut writer, MODEL_MAGIC)?;
        network.write_to(&mut writer)?;
        writer.flush()
    }

    pub fn load<F: Float>(path: impl AsRef<Path>) -> io::Result<Network<F>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let magic = wire::read_u32(&mut reader)?;
        if magic != MODEL_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad magic number {magic:#010x}; not a model file"),
            ));
        }
        Network::read_from(&mut reader)
    }
}
