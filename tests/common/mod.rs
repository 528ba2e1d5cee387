#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_predict::mapping::ColumnMapping;
use tempfile::{TempDir, tempdir};

/// Three Kepler-style rows; the second carries a non-numeric radius ratio.
pub const KOI_CSV: &str = "\
kepid,planet_no,koi_disposition,koi_ror,koi_smass,koi_slogg,koi_period,koi_duration,koi_time0,gv,lv,notes
10797460,1,1,0.022,0.919,4.467,9.488,2.957,170.538,0.41,0.52,first
10797460,2,1,abc,0.919,4.467,54.418,4.507,162.513,0.38,0.47,second
10811496,1,0,0.154,0.961,4.544,19.899,1.782,175.850,0.12,0.09,third
";

pub const KOI_MAPPING: &[(&str, &str)] = &[
    ("search_id", "kepid"),
    ("num_planet", "planet_no"),
    ("disposition", "koi_disposition"),
    ("ror", "koi_ror"),
    ("stellar_mass", "koi_smass"),
    ("ss_gravity", "koi_slogg"),
    ("period", "koi_period"),
    ("duration", "koi_duration"),
    ("transit_epoch", "koi_time0"),
    ("global_view", "gv"),
    ("local_view", "lv"),
];

/// The fast network returns the radius ratio (input 3) unchanged; the deep
/// network squashes two hidden units through a sigmoid.
pub const MODELS_YAML: &str = "\
fast:
  layers:
    - weights: [[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]]
      bias: [0.0]
deep:
  layers:
    - weights:
        - [0.0, 0.1, 0.5, 1.0, 0.2, 0.1, 0.0, 0.0, 0.0, 0.3, 0.3]
        - [0.0, -0.1, 0.2, 2.0, 0.1, 0.0, 0.0, 0.1, 0.0, 0.1, 0.1]
      bias: [0.0, 0.1]
      activation: relu
    - weights: [[0.7, 0.3]]
      bias: [-0.5]
      activation: sigmoid
";

pub fn koi_mapping() -> ColumnMapping {
    KOI_MAPPING.iter().copied().collect()
}

pub fn koi_mapping_json() -> String {
    serde_json::to_string(&koi_mapping()).expect("serialize mapping")
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}
