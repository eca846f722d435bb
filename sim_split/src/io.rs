//! Reading and writing pair stores and fingerprint files.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use log::{debug, warn};

use crate::data::FingerprintMatrix;
use crate::error::{Error, Result};
use crate::layout;
use crate::pairs::{PairRecord, PairStore};

impl PairRecord {

    pub fn to_arr(&self) -> [u8; layout::RECORD_SIZE] {

        let mut arr = [0u8; layout::RECORD_SIZE];
        BigEndian::write_u64(&mut arr[layout::I_START..layout::I_START + layout::I_SIZE], self.i as u64);
        BigEndian::write_u64(&mut arr[layout::J_START..layout::J_START + layout::J_SIZE], self.j as u64);
        BigEndian::write_f32(&mut arr[layout::SIM_START..layout::SIM_START + layout::SIM_SIZE], self.sim);

        return arr;
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {

        if slice.len() < layout::RECORD_SIZE {
            return Err(Error::MalformedPairFile(format!("record of {} bytes, expected {}", slice.len(), layout::RECORD_SIZE)));
        }

        let i = BigEndian::read_u64(&slice[layout::I_START..layout::I_START + layout::I_SIZE]) as usize;
        let j = BigEndian::read_u64(&slice[layout::J_START..layout::J_START + layout::J_SIZE]) as usize;
        let sim = BigEndian::read_f32(&slice[layout::SIM_START..layout::SIM_START + layout::SIM_SIZE]);

        return Ok(Self { i, j, sim });
    }
}

pub fn write_pairs<W: Write>(store: &PairStore, mut writer: W) -> Result<()> {

    let mut header = [0u8; layout::HEADER_SIZE];
    BigEndian::write_u64(&mut header[layout::COUNT_START..layout::COUNT_START + layout::COUNT_SIZE], store.len() as u64);
    BigEndian::write_f32(&mut header[layout::FLOOR_START..layout::FLOOR_START + layout::FLOOR_SIZE], store.floor());
    writer.write_all(&header)?;

    for record in store.records() {
        writer.write_all(&record.to_arr())?;
    }
    writer.flush()?;

    return Ok(());
}

/// Reads a store written by `write_pairs`. Every record must satisfy `i < j` and lie above the
/// stored floor.
pub fn read_pairs<R: Read>(mut reader: R) -> Result<PairStore> {

    let mut header = [0u8; layout::HEADER_SIZE];
    reader.read_exact(&mut header).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::MalformedPairFile("truncated header".to_string()),
        _ => Error::Io(e),
    })?;

    let count = BigEndian::read_u64(&header[layout::COUNT_START..layout::COUNT_START + layout::COUNT_SIZE]) as usize;
    let floor = BigEndian::read_f32(&header[layout::FLOOR_START..layout::FLOOR_START + layout::FLOOR_SIZE]);

    let mut records: Vec<PairRecord> = Vec::new();
    let mut arr = [0u8; layout::RECORD_SIZE];
    for k in 0..count {

        reader.read_exact(&mut arr).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::MalformedPairFile(format!("expected {} records, found {}", count, k)),
            _ => Error::Io(e),
        })?;

        let record = PairRecord::from_slice(&arr)?;
        if record.i >= record.j || !(record.sim > floor) {
            return Err(Error::MalformedPairFile(format!("invalid record {:?} with floor {}", record, floor)));
        }
        records.push(record);
    }

    return Ok(PairStore::new(records, floor));
}

pub fn write_pairs_to_file<P: AsRef<Path>>(store: &PairStore, filename: P) -> Result<()> {

    let file = File::create(filename.as_ref())?;
    write_pairs(store, BufWriter::new(file))?;
    debug!("Wrote {} pairs to {}", store.len(), filename.as_ref().display());

    return Ok(());
}

pub fn read_pairs_from_file<P: AsRef<Path>>(filename: P) -> Result<PairStore> {

    let file = File::open(filename)?;
    return read_pairs(BufReader::new(file));
}

/// Labels and fingerprints parsed from CSV text.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledFingerprints {
    pub labels: Vec<String>,
    pub rows: Vec<Vec<f32>>,
}

impl LabeledFingerprints {

    pub fn new() -> Self {
        Self { labels: Vec::new(), rows: Vec::new() }
    }

    pub fn extend(&mut self, other: LabeledFingerprints) {
        self.labels.extend(other.labels);
        self.rows.extend(other.rows);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Fails if the rows do not all have the same length.
    pub fn into_matrix(self) -> Result<(Vec<String>, FingerprintMatrix)> {

        let matrix = FingerprintMatrix::from_rows(self.rows)?;
        return Ok((self.labels, matrix));
    }
}

impl Default for LabeledFingerprints {

    fn default() -> Self {
        Self::new()
    }
}

/// Parses `label,v1,...,vd` lines after a header line. Lines that do not parse are skipped
/// with a warning.
pub fn read_fingerprints_csv<R: BufRead>(reader: R) -> Result<LabeledFingerprints> {

    let mut parsed = LabeledFingerprints::new();

    for (line_number, line) in reader.lines().enumerate() {

        let line = line?;
        if line_number == 0 || line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split(',');
        let label = match fields.next() {
            Some(label) => label.trim().to_string(),
            None => continue,
        };

        let values: std::result::Result<Vec<f32>, _> = fields.map(|x| x.trim().parse::<f32>()).collect();
        match values {
            Ok(values) if !values.is_empty() => {
                parsed.labels.push(label);
                parsed.rows.push(values);
            },
            _ => {
                warn!("Skipping line {} due to bad fields: {}", line_number + 1, line);
            },
        }
    }

    return Ok(parsed);
}

pub fn read_fingerprints_file<P: AsRef<Path>>(filename: P) -> Result<LabeledFingerprints> {

    let file = File::open(filename)?;
    return read_fingerprints_csv(BufReader::new(file));
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::data::FingerprintMatrix;
    use crate::metric::{DistanceMetric, MetricKind};
    use crate::similarity::{SimilarityEngine, Strategy};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn pairs_to_file_and_back() {

        let mut rng = StdRng::seed_from_u64(8);
        let fps = FingerprintMatrix::random_binary(40, 32, 0.4, &mut rng);
        let store = SimilarityEngine::new(DistanceMetric::Named(MetricKind::Jaccard), 0.3, Strategy::Dense)
            .compute(&fps)
            .unwrap();

        let filename = std::env::temp_dir().join("sim_split_pairs_test.bin");
        write_pairs_to_file(&store, &filename).unwrap();
        let loaded = read_pairs_from_file(&filename).unwrap();

        assert!(!store.is_empty());
        assert_eq!(loaded, store);
    }

    #[test]
    fn truncated_pair_file() {

        let store = PairStore::new(vec![PairRecord::new(0, 1, 0.9), PairRecord::new(1, 2, 0.8)], 0.5);
        let mut bytes: Vec<u8> = Vec::new();
        write_pairs(&store, &mut bytes).unwrap();
        assert_eq!(bytes.len(), layout::HEADER_SIZE + 2 * layout::RECORD_SIZE);

        bytes.truncate(bytes.len() - 3);
        let res = read_pairs(bytes.as_slice());

        assert!(matches!(res, Err(Error::MalformedPairFile(_))));
    }

    #[test]
    fn record_below_floor_is_rejected() {

        let mut bytes: Vec<u8> = Vec::new();
        write_pairs(&PairStore::new(vec![PairRecord::new(0, 1, 0.9)], 0.5), &mut bytes).unwrap();

        // raise the stored floor above the only record
        BigEndian::write_f32(&mut bytes[layout::FLOOR_START..layout::FLOOR_START + layout::FLOOR_SIZE], 0.95);

        assert!(matches!(read_pairs(bytes.as_slice()), Err(Error::MalformedPairFile(_))));
    }

    #[test]
    fn csv_skips_header_and_bad_lines() {

        let text = "id,b0,b1,b2\nmol_a,1,0,1\nmol_b,0,0,x\n\nmol_c, 1, 1, 0\n";
        let parsed = read_fingerprints_csv(text.as_bytes()).unwrap();

        assert_eq!(parsed.labels, vec!["mol_a".to_string(), "mol_c".to_string()]);
        assert_eq!(parsed.rows, vec![vec![1.0, 0.0, 1.0], vec![1.0, 1.0, 0.0]]);

        let (labels, matrix) = parsed.into_matrix().unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(matrix.length(), 3);
    }

    #[test]
    fn csv_ragged_rows_fail_on_matrix() {

        let text = "id,bits\na,1,0\nb,1\n";
        let parsed = read_fingerprints_csv(text.as_bytes()).unwrap();

        assert!(parsed.into_matrix().is_err());
    }
}
