use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::ExportConfig;
use crate::error::{ExportError, Result};

/// Builds `<clip_dir>/<prefix>/<prefix><stem>_clip_<start>_<end>.<ext>`
#[derive(Debug, Clone)]
pub struct ClipNamer {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl ClipNamer {
    pub fn new<P: Into<PathBuf>>(clip_dir: P, prefix: &str, extension: &str) -> Self {
        let prefix = prefix.to_string();
        Self {
            dir: clip_dir.into().join(&prefix),
            prefix,
            extension: extension.to_string(),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(&config.clip_dir, &config.prefix, &config.extension)
    }

    /// Directory all clips are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Output path for a clip of `source` spanning the given seconds
    pub fn clip_path(&self, source: &Path, start_time: f64, end_time: f64) -> Result<PathBuf> {
        let stem = source_stem(source)?;
        Ok(self.dir.join(format!(
            "{}{}_clip_{}_{}.{}",
            self.prefix,
            stem,
            start_time.floor() as i64,
            end_time.floor() as i64,
            self.extension
        )))
    }
}

/// File name up to the first '.', so `cam1.part2.mp4` names clips `cam1`
pub fn source_stem(source: &Path) -> Result<&str> {
    source
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| ExportError::InvalidSourceName {
            path: source.display().to_string(),
        }.into())
}

/// Tracks names handed out in one run
#[derive(Debug, Default)]
pub struct CollisionGuard {
    seen: HashSet<PathBuf>,
    disambiguate: bool,
}

impl CollisionGuard {
    pub fn new(disambiguate: bool) -> Self {
        Self { seen: HashSet::new(), disambiguate }
    }

    /// Returns the path to use and whether it collided with an earlier one
    ///
    /// Without disambiguation the colliding path is returned unchanged; the
    /// exporter then writes only the later clip.
    pub fn claim(&mut self, path: PathBuf, segment_index: usize) -> (PathBuf, bool) {
        if self.seen.insert(path.clone()) {
            return (path, false);
        }

        if !self.disambiguate {
            return (path, true);
        }

        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let renamed = match path.extension() {
            Some(ext) => path.with_file_name(format!("{}_{}.{}", stem, segment_index, ext.to_string_lossy())),
            None => path.with_file_name(format!("{}_{}", stem, segment_index)),
        };
        self.seen.insert(renamed.clone());
        (renamed, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_path_layout() {
        let namer = ClipNamer::new("clips", "YH_", "mp4");
        let path = namer.clip_path(Path::new("/data/0001_vid.mp4"), 125.9, 190.2).unwrap();
        assert_eq!(path, PathBuf::from("clips/YH_/YH_0001_vid_clip_125_190.mp4"));
        assert_eq!(namer.dir(), Path::new("clips/YH_"));
    }

    #[test]
    fn test_source_stem_stops_at_first_dot() {
        assert_eq!(source_stem(Path::new("a/cam1.part2.mp4")).unwrap(), "cam1");
        assert!(source_stem(Path::new("/")).is_err());
        assert!(source_stem(Path::new(".hidden")).is_err());
    }

    #[test]
    fn test_collisions_overwrite_by_default() {
        let mut guard = CollisionGuard::new(false);
        let path = PathBuf::from("clips/x_clip_10_15.mp4");
        assert_eq!(guard.claim(path.clone(), 0), (path.clone(), false));
        assert_eq!(guard.claim(path.clone(), 1), (path, true));
    }

    #[test]
    fn test_collisions_can_be_disambiguated() {
        let mut guard = CollisionGuard::new(true);
        let path = PathBuf::from("clips/x_clip_10_15.mp4");
        guard.claim(path.clone(), 0);
        let (renamed, collided) = guard.claim(path, 3);
        assert!(collided);
        assert_eq!(renamed, PathBuf::from("clips/x_clip_10_15_3.mp4"));
    }
}
