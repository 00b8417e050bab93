//! Block-list dataset loading.
//!
//! A dataset named `<name>` lives at `<dir>/<name>/<name>.block_list`. Each
//! non-comment line of the block list names one leaf block and the file
//! holding it; block files are JSON dumps that may hold several blocks and
//! are parsed once no matter how many blocks reference them.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::DatasetError;

/// One leaf block of a dataset.
#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub name: String,
    /// Lower corner of the block
    pub origin: [f64; 3],
    /// Cell width along each axis
    pub cell_width: [f64; 3],
    /// Cells along each axis
    pub dims: [usize; 3],
    /// Field values, x fastest
    pub fields: HashMap<String, Vec<f64>>,
}

/// A single cell's contribution to a field statistic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellSample {
    pub value: f64,
    /// Cell centre
    pub position: [f64; 3],
    /// Cell volume (the statistic weight)
    pub volume: f64,
}

impl Block {
    /// Number of cells, or `None` if `dims` overflows.
    pub fn cell_count(&self) -> Option<usize> {
        self.dims.iter().try_fold(1usize, |n, &d| n.checked_mul(d))
    }

    pub fn cell_volume(&self) -> f64 {
        self.cell_width.iter().product()
    }

    /// Centre of cell `(i, j, k)`.
    pub fn cell_center(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        let idx = [i, j, k];
        std::array::from_fn(|axis| {
            self.origin[axis] + (idx[axis] as f64 + 0.5) * self.cell_width[axis]
        })
    }

    /// Cells of `field` in storage order.
    pub fn samples<'a>(&'a self, field: &str) -> impl Iterator<Item = CellSample> + 'a {
        let values = self.fields.get(field).map(Vec::as_slice).unwrap_or(&[]);
        let [nx, ny, _] = self.dims;
        let volume = self.cell_volume();
        values.iter().enumerate().map(move |(n, &value)| {
            let i = n % nx;
            let j = (n / nx) % ny;
            let k = n / (nx * ny);
            CellSample {
                value,
                position: self.cell_center(i, j, k),
                volume,
            }
        })
    }

    fn validate(&self, field_list: &[String]) -> Result<(), DatasetError> {
        let volume = self.cell_volume();
        let bad_width = self.cell_width.iter().any(|w| !w.is_finite() || *w <= 0.0);
        if bad_width || !volume.is_finite() || volume <= 0.0 {
            return Err(DatasetError::Geometry {
                block: self.name.clone(),
                width: self.cell_width,
            });
        }
        let expected = self.cell_count().ok_or_else(|| DatasetError::Dims {
            block: self.name.clone(),
            dims: self.dims,
        })?;
        for field in field_list {
            let values = self.fields.get(field).ok_or_else(|| DatasetError::MissingField {
                block: self.name.clone(),
                field: field.clone(),
            })?;
            if values.len() != expected {
                return Err(DatasetError::Shape {
                    block: self.name.clone(),
                    field: field.clone(),
                    expected,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct BlockFile {
    blocks: Vec<Block>,
}

/// A loaded simulation output dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    blocks: Vec<Block>,
    field_list: Vec<String>,
}

impl Dataset {
    /// Path of the block list for dataset `name` under `dir`.
    pub fn block_list_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(name).join(format!("{name}.block_list"))
    }

    /// Load dataset `name` from `dir`.
    pub fn load(dir: &Path, name: &str) -> Result<Self, DatasetError> {
        Self::from_block_list(&Self::block_list_path(dir, name))
    }

    /// Load a dataset from its block list file.
    pub fn from_block_list(path: &Path) -> Result<Self, DatasetError> {
        let content = fs::read_to_string(path).map_err(|e| DatasetError::Read {
            path: path.to_owned(),
            source: e,
        })?;
        let base = path.parent().unwrap_or(Path::new("."));
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let entries = parse_block_list(path, &content)?;
        if entries.is_empty() {
            return Err(DatasetError::Empty(path.to_owned()));
        }

        let mut files: HashMap<String, HashMap<String, Block>> = HashMap::new();
        let mut blocks = Vec::with_capacity(entries.len());

        for (block_name, file_name) in entries {
            if !files.contains_key(&file_name) {
                let file_path = base.join(&file_name);
                let parsed = read_block_file(&file_path)?;
                debug!(file = %file_path.display(), blocks = parsed.len(), "Read block file");
                files.insert(file_name.clone(), parsed);
            }
            let block = files
                .get_mut(&file_name)
                .and_then(|in_file| in_file.remove(&block_name))
                .ok_or_else(|| DatasetError::MissingBlock {
                    block: block_name.clone(),
                    file: base.join(&file_name),
                })?;
            blocks.push(block);
        }

        let field_list: Vec<String> = blocks
            .iter()
            .flat_map(|b| b.fields.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        for block in &blocks {
            block.validate(&field_list)?;
        }

        info!(
            dataset = %name,
            blocks = blocks.len(),
            fields = field_list.len(),
            "Loaded dataset"
        );

        Ok(Self {
            name,
            blocks,
            field_list,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sorted names of every field in the dataset.
    pub fn field_list(&self) -> &[String] {
        &self.field_list
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Every cell of `field` across all blocks, in block-list order.
    pub fn samples<'a>(&'a self, field: &'a str) -> impl Iterator<Item = CellSample> + 'a {
        self.blocks.iter().flat_map(move |b| b.samples(field))
    }
}

/// Parse block list lines into `(block, file)` pairs.
fn parse_block_list(path: &Path, content: &str) -> Result<Vec<(String, String)>, DatasetError> {
    let mut entries = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(block), Some(file), None) => entries.push((block.to_string(), file.to_string())),
            _ => {
                return Err(DatasetError::MalformedBlockList {
                    path: path.to_owned(),
                    line: line_num + 1,
                    entry: line.to_string(),
                });
            }
        }
    }
    Ok(entries)
}

fn read_block_file(path: &Path) -> Result<HashMap<String, Block>, DatasetError> {
    let content = fs::read_to_string(path).map_err(|e| DatasetError::Read {
        path: path.to_owned(),
        source: e,
    })?;
    let file: BlockFile = serde_json::from_str(&content).map_err(|e| DatasetError::Parse {
        path: path.to_owned(),
        source: e,
    })?;
    Ok(file.blocks.into_iter().map(|b| (b.name.clone(), b)).collect())
}
