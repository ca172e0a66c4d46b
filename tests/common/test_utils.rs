use breach_filters_rs::FilterKey;
use rand::{SeedableRng, rngs::SmallRng};
use std::collections::HashSet;
use std::sync::Once;
use std::{
    fs,
    path::{Path, PathBuf},
};

static TRACING: Once = Once::new();

/// Installs a subscriber honoring `RUST_LOG` so build diagnostics show up
/// under `--nocapture`. Safe to call from every test.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Temporary on-disk artifact that is cleaned up when the test ends.
pub struct TestFile {
    path: PathBuf,
}

impl TestFile {
    pub fn new(test_name: &str) -> Self {
        let path = format!("test_filter_{}.bin", test_name).into();
        Self { path }
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TestFile {
    fn drop(&mut self) {
        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Random keys that are distinct in their low 64 bits, which is the part
/// the fuse filter consumes.
#[allow(dead_code)]
pub fn distinct_keys(count: usize, seed: u64) -> Vec<FilterKey> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut seen = HashSet::with_capacity(count);
    let mut keys = Vec::with_capacity(count);
    while keys.len() < count {
        let key = FilterKey::random(&mut rng);
        if seen.insert(key.ribbon as u64) {
            keys.push(key);
        }
    }
    keys
}
