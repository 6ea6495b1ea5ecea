//! Split id files and stratified split generation

use crate::models::{ClipRecord, SplitName};
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Load clip ids from a split file, one id per non-empty line
pub fn load_split_ids(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read split file: {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Write clip ids to a split file, one per line
pub fn write_split_ids(path: &Path, ids: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create split file: {}", path.display()))?;
    let mut writer = std::io::BufWriter::new(file);
    for id in ids {
        writeln!(writer, "{}", id)?;
    }
    writer.flush()?;
    Ok(())
}

/// Fractions of each species assigned to train and validation; the rest is test
#[derive(Debug, Clone, Copy)]
pub struct SplitRatios {
    pub train: f64,
    pub val: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.70,
            val: 0.15,
        }
    }
}

impl SplitRatios {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.train) || !(0.0..=1.0).contains(&self.val) {
            anyhow::bail!("Split ratios must lie in [0, 1]");
        }
        if self.train + self.val > 1.0 {
            anyhow::bail!(
                "train ({}) + val ({}) ratios exceed 1.0",
                self.train,
                self.val
            );
        }
        Ok(())
    }

    pub fn test(&self) -> f64 {
        1.0 - self.train - self.val
    }
}

/// Clip ids assigned to each split, each list sorted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Splits {
    pub train: Vec<String>,
    pub val: Vec<String>,
    pub test_ood: Vec<String>,
}

impl Splits {
    pub fn get(&self, split: SplitName) -> &[String] {
        match split {
            SplitName::Train => &self.train,
            SplitName::Val => &self.val,
            SplitName::TestOod => &self.test_ood,
        }
    }

    pub fn total(&self) -> usize {
        self.train.len() + self.val.len() + self.test_ood.len()
    }

    /// Write `train_ids.txt`, `val_ids.txt` and `test_ood_ids.txt` into `dir`
    pub fn write_to_dir(&self, dir: &Path) -> Result<()> {
        for split in SplitName::ALL {
            write_split_ids(&dir.join(split.ids_filename()), self.get(split))?;
        }
        Ok(())
    }
}

/// Split clips per species so that every species is represented in each split
///
/// Species are visited in sorted order and one seeded generator is shared across
/// them, so the same records and seed always yield the same assignment.
pub fn stratified_split(records: &[ClipRecord], ratios: SplitRatios, seed: u64) -> Result<Splits> {
    ratios.validate()?;

    let mut by_species: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for record in records {
        by_species
            .entry(record.species_code.as_str())
            .or_default()
            .push(record.clip_id.clone());
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut splits = Splits::default();

    for (species, mut ids) in by_species {
        ids.shuffle(&mut rng);

        let n_total = ids.len();
        let n_train = (n_total as f64 * ratios.train) as usize;
        let n_val = (n_total as f64 * ratios.val) as usize;

        log::debug!(
            "{}: total {} | train {} | val {} | test {}",
            species,
            n_total,
            n_train,
            n_val,
            n_total - n_train - n_val
        );

        let test = ids.split_off(n_train + n_val);
        let val = ids.split_off(n_train);
        splits.train.extend(ids);
        splits.val.extend(val);
        splits.test_ood.extend(test);
    }

    splits.train.sort();
    splits.val.sort();
    splits.test_ood.sort();

    Ok(splits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<ClipRecord> {
        let mut records = Vec::new();
        for (species, count) in [("amerob", 20), ("norcar", 10), ("amecro", 7)] {
            for i in 0..count {
                records.push(ClipRecord {
                    clip_id: format!("XC{}{:03}", species, i),
                    filename: format!("{}_{}.wav", species, i),
                    species_code: species.to_string(),
                    duration_s: 12.0,
                    secondary_labels: Vec::new(),
                });
            }
        }
        records
    }

    #[test]
    fn test_stratified_split_sizes() {
        let splits = stratified_split(&corpus(), SplitRatios::default(), 42).unwrap();
        // amerob 14/3/3, norcar 7/1/2, amecro 4/1/2
        assert_eq!(splits.train.len(), 25);
        assert_eq!(splits.val.len(), 5);
        assert_eq!(splits.test_ood.len(), 7);
        assert_eq!(splits.total(), 37);
    }

    #[test]
    fn test_stratified_split_is_disjoint_and_sorted() {
        let splits = stratified_split(&corpus(), SplitRatios::default(), 7).unwrap();
        let mut all: Vec<&String> = splits
            .train
            .iter()
            .chain(&splits.val)
            .chain(&splits.test_ood)
            .collect();
        let before = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), before);

        for list in [&splits.train, &splits.val, &splits.test_ood] {
            assert!(list.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_stratified_split_is_reproducible() {
        let a = stratified_split(&corpus(), SplitRatios::default(), 42).unwrap();
        let b = stratified_split(&corpus(), SplitRatios::default(), 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_ratios() {
        let ratios = SplitRatios { train: 0.9, val: 0.2 };
        assert!(stratified_split(&corpus(), ratios, 42).is_err());
    }

    #[test]
    fn test_write_splits_to_dir() {
        let dir = std::env::temp_dir().join(format!("birdwin-splits-{}", std::process::id()));
        let splits = stratified_split(&corpus(), SplitRatios::default(), 42).unwrap();
        splits.write_to_dir(&dir).unwrap();

        let train = load_split_ids(&dir.join("train_ids.txt")).unwrap();
        let test = load_split_ids(&dir.join("test_ood_ids.txt")).unwrap();
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(train, splits.train);
        assert_eq!(test, splits.test_ood);
    }

    #[test]
    fn test_load_split_ids_skips_blank_lines() {
        let path = std::env::temp_dir().join(format!("birdwin-ids-{}.txt", std::process::id()));
        std::fs::write(&path, "XC1\n\n  XC2  \n").unwrap();

        let ids = load_split_ids(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(ids, vec!["XC1", "XC2"]);
    }
}
