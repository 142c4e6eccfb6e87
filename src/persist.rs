//! Saving and loading trained networks.
//!
//! A network is stored as its bincode encoding: layer sizes, biases, weights,
//! then the regularization parameter. Decoding checks every shape again, so a
//! file that was truncated or edited is rejected instead of producing a
//! network that panics later.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::network::Network;

pub fn encode(network: &Network) -> Result<Vec<u8>> {
    bincode::serialize(network).context("failed to encode network")
}

pub fn decode(bytes: &[u8]) -> Result<Network> {
    bincode::deserialize(bytes).context("failed to decode network")
}

pub fn save(path: &Path, network: &Network) -> Result<()> {
    let mut f = BufWriter::new(
        File::create(path).with_context(|| format!("error creating model file {path:?}"))?,
    );
    bincode::serialize_into(&mut f, network)
        .with_context(|| format!("error writing model file {path:?}"))?;
    f.flush()
        .with_context(|| format!("error writing model file {path:?}"))?;
    info!(?path, nodes = ?network.nodes(), "saved network");
    Ok(())
}

pub fn load(path: &Path) -> Result<Network> {
    let f = BufReader::new(
        File::open(path).with_context(|| format!("error opening model file {path:?}"))?,
    );
    let network: Network = bincode::deserialize_from(f)
        .with_context(|| format!("failed to load network from file {path:?}"))?;
    info!(?path, nodes = ?network.nodes(), "loaded network");
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small() -> Network {
        Network::from_parameters(
            vec![2, 1],
            vec![array![0.5]],
            vec![array![[0.25, -1.5]]],
            3.0,
        )
        .unwrap()
    }

    #[test]
    fn round_trip() {
        let network = small();
        let decoded = decode(&encode(&network).unwrap()).unwrap();
        assert_eq!(decoded, network);
        assert_eq!(decoded.lambda(), 3.0);
    }

    #[test]
    fn truncated_input() {
        let bytes = encode(&small()).unwrap();
        assert!(decode(&bytes[..bytes.len() - 4]).is_err());
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn save_and_load() {
        let path = std::env::temp_dir().join(format!(
            "simple-neural-net-persist-{}.bin",
            std::process::id()
        ));
        let network = small();
        save(&path, &network).unwrap();
        let loaded = load(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded.unwrap(), network);

        assert!(load(&path).is_err());
    }
}
