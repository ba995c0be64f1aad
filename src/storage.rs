use anyhow::{anyhow, Context};
use motion::{HistoryRow, Orientation, Persistence, CSV_HEADER};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

const CALIBRATION_FILE: &str = "calibration.txt";
const HISTORY_FILE: &str = "history.csv";

/// Calibration pose and history log as plain files in one directory.
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
    available: bool,
}

impl FileStorage {
    /// Never fails: an unusable directory leaves the storage unavailable and
    /// the tracker runs on in-memory defaults.
    pub fn open(dir: impl Into<PathBuf>) -> FileStorage {
        let dir = dir.into();
        let available = match fs::create_dir_all(&dir) {
            Ok(()) => {
                log::info!("Storage mounted at {}", dir.display());
                true
            }
            Err(e) => {
                log::warn!("Storage unavailable at {}: {}", dir.display(), e);
                false
            }
        };
        FileStorage { dir, available }
    }

    fn calibration_path(&self) -> PathBuf {
        self.dir.join(CALIBRATION_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }
}

fn parse_calibration(content: &str) -> anyhow::Result<Orientation> {
    let (yaw, tilt) = content
        .trim()
        .split_once(',')
        .ok_or_else(|| anyhow!("expected \"yaw,tilt\", got {:?}", content.trim()))?;
    let yaw = yaw.trim().parse().context("bad yaw")?;
    let tilt = tilt.trim().parse().context("bad tilt")?;
    Ok(Orientation::new(yaw, tilt))
}

impl Persistence for FileStorage {
    fn is_available(&self) -> bool {
        self.available
    }

    fn load_calibration(&mut self) -> anyhow::Result<Option<Orientation>> {
        let path = self.calibration_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        parse_calibration(&content)
            .with_context(|| format!("parsing {}", path.display()))
            .map(Some)
    }

    fn save_calibration(&mut self, orientation: Orientation) -> anyhow::Result<()> {
        let path = self.calibration_path();
        fs::write(&path, format!("{},{}\n", orientation.yaw, orientation.tilt))
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!(
            "Calibration saved: yaw={} tilt={}",
            orientation.yaw,
            orientation.tilt
        );
        Ok(())
    }

    fn append_history_row(&mut self, row: &HistoryRow) -> anyhow::Result<()> {
        let path = self.history_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;
        if file.metadata()?.len() == 0 {
            writeln!(file, "{}", CSV_HEADER)?;
        }
        writeln!(file, "{}", row)?;
        Ok(())
    }
}
