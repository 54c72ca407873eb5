use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".permitwalk"))
            .unwrap_or_else(|| PathBuf::from(".permitwalk"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.base.join("output")
    }

    /// Relative file names from the config land in the output directory;
    /// absolute paths are used as-is.
    pub fn resolve_output(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.output_dir().join(path)
        }
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.base)?;
        std::fs::create_dir_all(self.output_dir())?;
        Ok(())
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_output() {
        let paths = Paths::with_base(PathBuf::from("/tmp/pw"));
        assert_eq!(
            paths.resolve_output("permits.jsonl"),
            PathBuf::from("/tmp/pw/output/permits.jsonl")
        );
        assert_eq!(
            paths.resolve_output("/var/out.jsonl"),
            PathBuf::from("/var/out.jsonl")
        );
    }
}
